//! Feather Dash core - game simulation for the motion-controlled flappy race
//!
//! Runs one player's round next to the browser front-end. It handles:
//! - The fixed-rate round simulation (physics, pipes, collisions, timers)
//! - WebSocket input (flap, readiness) and render snapshots
//! - Lobby documents and peer state sync through a shared document store

mod app;
mod config;
mod game;
mod http;
mod store;
mod sync;
mod util;
mod ws;

use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::GameMode;
use crate::http::build_router;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize the monotonic round clock
    init_server_time();

    info!(
        mode = ?config.game_mode,
        player_id = %config.player_id,
        "Starting Feather Dash core"
    );
    info!("Server address: {}", config.server_addr);

    // Create application state and the round session
    let (state, session) = AppState::new(config.clone());
    tokio::spawn(session.run());

    // A missing lobby is fatal: no round may start without it
    if let Some(code) = &config.lobby_code {
        if config.game_mode == GameMode::Multiplayer {
            state
                .enter_lobby(code)
                .await
                .with_context(|| format!("Failed to join lobby {}", code))?;
        } else {
            warn!(lobby = %code, mode = ?config.game_mode, "LOBBY_CODE ignored outside multiplayer");
        }
    }

    // Build router
    let router = build_router(state.clone());

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Best effort, like closing the tab
    if let Err(e) = state.leave_lobby().await {
        warn!(error = %e, "Failed to leave lobby on shutdown");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
