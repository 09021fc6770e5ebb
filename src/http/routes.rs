//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::app::AppState;
use crate::game::{RoundPhase, RoundSnapshot};
use crate::store::LobbyError;
use crate::sync::mirror::PeerState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let lobby_routes = Router::new()
        .route("/lobby", post(create_lobby_handler))
        .route("/lobby/join", post(join_lobby_handler))
        .route("/lobby/enter", post(enter_lobby_handler))
        .route("/lobby/ready", post(ready_handler))
        .route("/lobby/start", post(start_handler))
        .route("/lobby/leave", post(leave_handler))
        .route("/lobby/:code/players", get(players_handler));

    Router::new()
        .route("/health", get(health_handler))
        .route("/snapshot", get(snapshot_handler))
        .route("/ws", get(ws_handler))
        .merge(lobby_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        .with_state(state)
}

// ============================================================================
// Health and state
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    player_id: String,
    phase: RoundPhase,
    lobby: Option<String>,
    store: &'static str,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        player_id: state.player.id.clone(),
        phase: state.session.latest().phase,
        lobby: state.current_lobby().await,
        store: state.lobbies.store().backend_name(),
    })
}

async fn snapshot_handler(State(state): State<AppState>) -> Json<RoundSnapshot> {
    Json(state.session.latest())
}

// ============================================================================
// Lobby endpoints
// ============================================================================

#[derive(Deserialize)]
struct CodeRequest {
    code: String,
}

#[derive(Deserialize)]
struct ReadyRequest {
    /// Defaults to the lobby the session is synced with
    code: Option<String>,
    ready: bool,
}

#[derive(Deserialize, Default)]
struct OptionalCodeRequest {
    code: Option<String>,
}

#[derive(Serialize)]
struct LobbyResponse {
    code: String,
    owner: String,
    started: bool,
}

#[derive(Serialize)]
struct PlayersResponse {
    code: String,
    players: Vec<PeerState>,
}

async fn create_lobby_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<LobbyResponse>), AppError> {
    let code = state
        .lobbies
        .create_lobby(&state.player.id, &state.player.name)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(LobbyResponse {
            code,
            owner: state.player.id.clone(),
            started: false,
        }),
    ))
}

async fn join_lobby_handler(
    State(state): State<AppState>,
    Json(req): Json<CodeRequest>,
) -> Result<Json<LobbyResponse>, AppError> {
    let code = normalize_code(&req.code)?;
    let lobby = state
        .lobbies
        .join_lobby(&code, &state.player.id, &state.player.name)
        .await?;

    Ok(Json(LobbyResponse {
        code,
        owner: lobby.owner,
        started: lobby.started,
    }))
}

async fn enter_lobby_handler(
    State(state): State<AppState>,
    Json(req): Json<CodeRequest>,
) -> Result<Json<LobbyResponse>, AppError> {
    let code = normalize_code(&req.code)?;
    let lobby = state.enter_lobby(&code).await?;

    Ok(Json(LobbyResponse {
        code,
        owner: lobby.owner,
        started: lobby.started,
    }))
}

async fn ready_handler(
    State(state): State<AppState>,
    Json(req): Json<ReadyRequest>,
) -> Result<StatusCode, AppError> {
    let code = resolve_code(&state, req.code).await?;
    state
        .lobbies
        .set_ready(&code, &state.player.id, req.ready)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn start_handler(
    State(state): State<AppState>,
    Json(req): Json<OptionalCodeRequest>,
) -> Result<StatusCode, AppError> {
    let code = resolve_code(&state, req.code).await?;
    state.lobbies.start(&code, &state.player.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn leave_handler(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    match state.leave_lobby().await? {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(AppError::NotFound("Not in a lobby".to_string())),
    }
}

async fn players_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<PlayersResponse>, AppError> {
    let code = normalize_code(&code)?;
    if state.lobbies.get_lobby(&code).await?.is_none() {
        return Err(LobbyError::NotFound(code).into());
    }

    let players = state
        .lobbies
        .list_players(&code)
        .await?
        .into_iter()
        .map(|(id, doc)| PeerState::from_doc(id, doc))
        .collect();

    Ok(Json(PlayersResponse { code, players }))
}

fn normalize_code(raw: &str) -> Result<String, AppError> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::BadRequest(format!("Invalid lobby code '{}'", raw)));
    }
    Ok(code)
}

async fn resolve_code(state: &AppState, code: Option<String>) -> Result<String, AppError> {
    match code {
        Some(code) => normalize_code(&code),
        None => state
            .current_lobby()
            .await
            .ok_or_else(|| AppError::BadRequest("No lobby code given and not in a lobby".to_string())),
    }
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LobbyError> for AppError {
    fn from(e: LobbyError) -> Self {
        match e {
            LobbyError::NotFound(_) => AppError::NotFound(e.to_string()),
            LobbyError::Full { .. } | LobbyError::NotAllReady { .. } => {
                AppError::Conflict(e.to_string())
            }
            LobbyError::NotOwner => AppError::Forbidden(e.to_string()),
            LobbyError::Store(inner) => AppError::Internal(inner.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
