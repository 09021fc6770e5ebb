//! Store writer task for state pushes

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::{DocumentStore, LobbyStore};

use super::synchronizer::StatePush;

/// Drain state pushes into the player's document. Only the newest queued
/// push is written; failures are logged and not retried.
pub fn spawn_state_writer<S: DocumentStore>(
    lobbies: LobbyStore<S>,
    code: String,
    player_id: String,
    mut rx: mpsc::Receiver<StatePush>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(mut push) = rx.recv().await {
            while let Ok(newer) = rx.try_recv() {
                push = newer;
            }

            if let Err(e) = lobbies
                .push_state(&code, &player_id, push.x, push.y, push.score)
                .await
            {
                warn!(lobby = %code, player_id = %player_id, error = %e, "State push failed");
            }
        }

        debug!(lobby = %code, player_id = %player_id, "State writer stopped");
    })
}
