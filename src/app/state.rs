//! Application state shared across routes

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::{Config, StoreBackend};
use crate::game::{GameSession, RoundConfig, SessionHandle, SessionInput, SessionSettings, World};
use crate::store::lobby::LobbyDoc;
use crate::store::{FirestoreClient, LobbyError, LobbyStore, MemoryStore, Store};

/// The local player
#[derive(Debug, Clone)]
pub struct PlayerIdentity {
    pub id: String,
    pub name: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub player: Arc<PlayerIdentity>,
    pub lobbies: LobbyStore<Store>,
    pub session: SessionHandle,
    /// Lobby the session is currently synced with
    pub current_lobby: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// Build the state and the session it drives. The caller spawns the session.
    pub fn new(config: Config) -> (Self, GameSession<Store>) {
        let config = Arc::new(config);

        let store = match &config.store_backend {
            StoreBackend::Memory => Store::Memory(MemoryStore::new()),
            StoreBackend::Firestore(firestore) => Store::Firestore(FirestoreClient::new(firestore)),
        };
        info!(backend = store.backend_name(), "Document store ready");
        let lobbies = LobbyStore::new(store);

        let player = Arc::new(PlayerIdentity {
            id: config.player_id.clone(),
            name: config.player_name.clone(),
        });

        let settings = SessionSettings {
            round: RoundConfig::for_mode(
                config.game_mode,
                World::new(config.world_width, config.world_height),
            ),
            seed: config.rng_seed.unwrap_or_else(rand::random),
            player_id: player.id.clone(),
            player_name: player.name.clone(),
            peer_poll: config.peer_poll,
        };
        let (session, handle) = GameSession::new(settings, lobbies.clone());

        let state = Self {
            config,
            player,
            lobbies,
            session: handle,
            current_lobby: Arc::new(RwLock::new(None)),
        };

        (state, session)
    }

    /// Seat the local player in a lobby's race and start syncing with it.
    /// A different lobby entered earlier is left first, best-effort.
    pub async fn enter_lobby(&self, code: &str) -> Result<LobbyDoc, LobbyError> {
        let round = RoundConfig::for_mode(
            self.config.game_mode,
            World::new(self.config.world_width, self.config.world_height),
        );
        let lobby = self
            .lobbies
            .enter_game(code, &self.player.id, &self.player.name, round.start_x, round.start_y)
            .await?;

        let previous = self.current_lobby.write().await.replace(code.to_string());
        if let Some(previous) = previous.filter(|prev| prev != code) {
            match self.lobbies.leave(&previous, &self.player.id).await {
                Ok(()) => info!(lobby = %previous, player_id = %self.player.id, "Left lobby"),
                Err(e) => warn!(lobby = %previous, error = %e, "Failed to leave previous lobby"),
            }
        }

        self.session
            .send(SessionInput::LobbyJoined {
                code: code.to_string(),
            })
            .await;

        info!(lobby = %code, player_id = %self.player.id, "Entered lobby");
        Ok(lobby)
    }

    /// Remove the local player from the current lobby, if any
    pub async fn leave_lobby(&self) -> Result<Option<String>, LobbyError> {
        let Some(code) = self.current_lobby.write().await.take() else {
            return Ok(None);
        };

        self.session.send(SessionInput::LobbyLeft).await;
        self.lobbies.leave(&code, &self.player.id).await?;
        info!(lobby = %code, player_id = %self.player.id, "Left lobby");
        Ok(Some(code))
    }

    pub async fn current_lobby(&self) -> Option<String> {
        self.current_lobby.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> Config {
        Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "info".to_string(),
            client_origin: "http://localhost:3000".to_string(),
            game_mode: crate::game::GameMode::Multiplayer,
            world_width: 1280.0,
            world_height: 800.0,
            rng_seed: Some(5),
            player_id: "me00001".to_string(),
            player_name: "Me".to_string(),
            lobby_code: None,
            store_backend: StoreBackend::Memory,
            peer_poll: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_enter_and_leave_lobby() {
        let (state, session) = AppState::new(config());
        tokio::spawn(session.run());

        let code = state.lobbies.create_lobby("bo00001", "Bo").await.unwrap();
        state.enter_lobby(&code).await.unwrap();
        assert_eq!(state.current_lobby().await, Some(code.clone()));

        let players = state.lobbies.list_players(&code).await.unwrap();
        let me = players.iter().find(|(id, _)| id == "me00001").unwrap();
        assert_eq!(me.1.color, "yellow");
        assert_eq!((me.1.x, me.1.y), (100.0, 300.0));

        assert_eq!(state.leave_lobby().await.unwrap(), Some(code.clone()));
        let players = state.lobbies.list_players(&code).await.unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(state.leave_lobby().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entering_second_lobby_leaves_first() {
        let (state, session) = AppState::new(config());
        tokio::spawn(session.run());

        let first = state.lobbies.create_lobby("bo00001", "Bo").await.unwrap();
        let second = state.lobbies.create_lobby("cy00001", "Cy").await.unwrap();
        state.enter_lobby(&first).await.unwrap();
        state.enter_lobby(&second).await.unwrap();
        assert_eq!(state.current_lobby().await, Some(second.clone()));

        let players = state.lobbies.list_players(&first).await.unwrap();
        assert!(players.iter().all(|(id, _)| id != "me00001"));
        let players = state.lobbies.list_players(&second).await.unwrap();
        assert!(players.iter().any(|(id, _)| id == "me00001"));
    }

    #[tokio::test]
    async fn test_enter_missing_lobby_fails() {
        let (state, _session) = AppState::new(config());
        let result = state.enter_lobby("NOPE1").await;
        assert!(matches!(result, Err(LobbyError::NotFound(_))));
        assert_eq!(state.current_lobby().await, None);
    }
}
