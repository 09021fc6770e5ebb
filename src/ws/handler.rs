//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{SessionHandle, SessionInput};
use crate::util::rate_limit::InputRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, FlapSource, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, player_id = %state.player.id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        player_id: state.player.id.clone(),
        mode: state.config.game_mode,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(conn_id = %conn_id, error = %e, "Failed to send welcome");
        return;
    }

    // Current phase first, so a late client is not left guessing
    let phase = ServerMsg::Phase {
        phase: state.session.latest().phase,
    };
    if let Err(e) = send_msg(&mut ws_sink, &phase).await {
        debug!(conn_id = %conn_id, error = %e, "Failed to send phase");
        return;
    }

    run_connection(conn_id, ws_sink, ws_stream, state.session.clone()).await;

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Run the connection with read/write split
async fn run_connection(
    conn_id: Uuid,
    ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    session: SessionHandle,
) {
    let rate_limiter = InputRateLimiter::new();

    // Replies meant for this connection only (pong)
    let (reply_tx, reply_rx) = mpsc::channel::<ServerMsg>(16);
    let writer_handle = tokio::spawn(write_loop(conn_id, ws_sink, session.subscribe(), reply_rx));

    // Reader loop: WebSocket -> session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Ping { t }) => {
                        let _ = reply_tx.send(ServerMsg::Pong { t }).await;
                    }
                    Ok(client_msg) => {
                        let Some(input) = to_session_input(client_msg, &rate_limiter) else {
                            continue;
                        };
                        if !session.send(input).await {
                            debug!(conn_id = %conn_id, "Session input channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                        let _ = reply_tx
                            .send(ServerMsg::error("bad_message", e.to_string()))
                            .await;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received control frame");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Session broadcasts and direct replies -> WebSocket
async fn write_loop(
    conn_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut events_rx: broadcast::Receiver<ServerMsg>,
    mut reply_rx: mpsc::Receiver<ServerMsg>,
) {
    loop {
        let msg = tokio::select! {
            event = events_rx.recv() => match event {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Snapshots are full state; skipping some is harmless
                    warn!(conn_id = %conn_id, lagged_count = n, "Client lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(conn_id = %conn_id, "Session channel closed");
                    break;
                }
            },
            reply = reply_rx.recv() => match reply {
                Some(msg) => msg,
                None => break,
            },
        };

        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Map a client message to a session input. Motion flaps inside the
/// cooldown window are dropped here.
fn to_session_input(msg: ClientMsg, limiter: &InputRateLimiter) -> Option<SessionInput> {
    match msg {
        ClientMsg::Flap { source } => {
            if source == FlapSource::Motion && !limiter.check_motion_flap() {
                return None;
            }
            Some(SessionInput::Flap { source })
        }
        ClientMsg::Ready { requirement } => Some(SessionInput::Ready(requirement)),
        ClientMsg::CaptureDenied { reason } => Some(SessionInput::CaptureDenied { reason }),
        ClientMsg::Restart => Some(SessionInput::Restart),
        ClientMsg::Ping { .. } => None,
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
