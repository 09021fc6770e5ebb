//! Lobby and player documents

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{to_fields, Document, DocumentStore, StoreError};

/// Players allowed in one lobby
pub const MAX_LOBBY_PLAYERS: usize = 10;

const CODE_LENGTH: usize = 5;
const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// `lobbies/{code}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyDoc {
    pub owner: String,
    #[serde(default)]
    pub started: bool,
    #[serde(default)]
    pub created_at: i64,
}

/// `lobbies/{code}/players/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerDoc {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub ready: bool,
}

impl PlayerDoc {
    fn fresh(name: &str, color: &str) -> Self {
        Self {
            name: name.to_string(),
            color: color.to_string(),
            x: 100.0,
            y: 300.0,
            score: 0,
            ready: false,
        }
    }
}

/// Lobby errors
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("Lobby {0} does not exist")]
    NotFound(String),

    #[error("Lobby {code} is full ({max} players max)")]
    Full { code: String, max: usize },

    #[error("Only the lobby owner can start the race")]
    NotOwner,

    #[error("Not every player is ready ({ready}/{total})")]
    NotAllReady { ready: usize, total: usize },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub fn lobby_path(code: &str) -> String {
    format!("lobbies/{}", code)
}

pub fn players_path(code: &str) -> String {
    format!("lobbies/{}/players", code)
}

pub fn player_path(code: &str, player_id: &str) -> String {
    format!("lobbies/{}/players/{}", code, player_id)
}

/// Random upper-case base-36 lobby code
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Lobby operations over a document store
#[derive(Clone)]
pub struct LobbyStore<S> {
    store: S,
}

impl<S: DocumentStore> LobbyStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a lobby by code
    pub async fn get_lobby(&self, code: &str) -> Result<Option<LobbyDoc>, LobbyError> {
        match self.store.get(&lobby_path(code)).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    async fn require_lobby(&self, code: &str) -> Result<LobbyDoc, LobbyError> {
        self.get_lobby(code)
            .await?
            .ok_or_else(|| LobbyError::NotFound(code.to_string()))
    }

    /// Create a lobby owned by `owner_id` and seat the owner in it
    pub async fn create_lobby(&self, owner_id: &str, name: &str) -> Result<String, LobbyError> {
        let code = generate_code();
        let lobby = LobbyDoc {
            owner: owner_id.to_string(),
            started: false,
            created_at: chrono::Utc::now().timestamp_millis(),
        };

        self.store.set(&lobby_path(&code), to_fields(&lobby)?).await?;
        self.store
            .set(
                &player_path(&code, owner_id),
                to_fields(&PlayerDoc::fresh(name, "orange"))?,
            )
            .await?;

        Ok(code)
    }

    /// Join an existing lobby from the lobby screen
    pub async fn join_lobby(
        &self,
        code: &str,
        player_id: &str,
        name: &str,
    ) -> Result<LobbyDoc, LobbyError> {
        let lobby = self.require_lobby(code).await?;

        let players = self.store.list(&players_path(code)).await?;
        let already_seated = players.iter().any(|p| p.id == player_id);
        if !already_seated && players.len() >= MAX_LOBBY_PLAYERS {
            return Err(LobbyError::Full {
                code: code.to_string(),
                max: MAX_LOBBY_PLAYERS,
            });
        }

        self.store
            .set(
                &player_path(code, player_id),
                to_fields(&PlayerDoc::fresh(name, "white"))?,
            )
            .await?;

        Ok(lobby)
    }

    /// Seat the player in the race itself, resetting position and score
    pub async fn enter_game(
        &self,
        code: &str,
        player_id: &str,
        name: &str,
        x: f32,
        y: f32,
    ) -> Result<LobbyDoc, LobbyError> {
        let lobby = self.require_lobby(code).await?;

        let doc = PlayerDoc {
            x,
            y,
            ..PlayerDoc::fresh(name, "yellow")
        };
        self.store
            .set(&player_path(code, player_id), to_fields(&doc)?)
            .await?;

        Ok(lobby)
    }

    pub async fn set_ready(&self, code: &str, player_id: &str, ready: bool) -> Result<(), LobbyError> {
        let fields = to_fields(&json!({ "ready": ready }))?;
        self.store.update(&player_path(code, player_id), fields).await?;
        Ok(())
    }

    /// Flag the lobby as started; owner only, and only once everyone is ready
    pub async fn start(&self, code: &str, player_id: &str) -> Result<(), LobbyError> {
        let lobby = self.require_lobby(code).await?;
        if lobby.owner != player_id {
            return Err(LobbyError::NotOwner);
        }

        let players = self.list_players(code).await?;
        let ready = players.iter().filter(|(_, p)| p.ready).count();
        if players.is_empty() || ready < players.len() {
            return Err(LobbyError::NotAllReady {
                ready,
                total: players.len(),
            });
        }

        let fields = to_fields(&json!({ "started": true }))?;
        self.store.update(&lobby_path(code), fields).await?;
        Ok(())
    }

    /// Remove the player's document
    pub async fn leave(&self, code: &str, player_id: &str) -> Result<(), LobbyError> {
        self.store.delete(&player_path(code, player_id)).await?;
        Ok(())
    }

    /// Partial update of the player's race state
    pub async fn push_state(
        &self,
        code: &str,
        player_id: &str,
        x: f32,
        y: f32,
        score: u32,
    ) -> Result<(), LobbyError> {
        let fields = to_fields(&json!({ "x": x, "y": y, "score": score }))?;
        self.store.update(&player_path(code, player_id), fields).await?;
        Ok(())
    }

    /// Every player document in the lobby, ordered by id
    pub async fn list_players(&self, code: &str) -> Result<Vec<(String, PlayerDoc)>, LobbyError> {
        let docs = self.store.list(&players_path(code)).await?;
        docs.into_iter()
            .map(|doc: Document| -> Result<(String, PlayerDoc), LobbyError> {
                let player = doc.decode::<PlayerDoc>()?;
                Ok((doc.id, player))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn lobby_store() -> LobbyStore<MemoryStore> {
        LobbyStore::new(MemoryStore::new())
    }

    #[test]
    fn test_generated_code_shape() {
        let code = generate_code();
        assert_eq!(code.len(), 5);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn test_create_and_join() {
        let lobbies = lobby_store();
        let code = lobbies.create_lobby("owner01", "Ada").await.unwrap();

        let lobby = lobbies.join_lobby(&code, "guest01", "Bo").await.unwrap();
        assert_eq!(lobby.owner, "owner01");
        assert!(!lobby.started);

        let players = lobbies.list_players(&code).await.unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].0, "guest01");
        assert_eq!(players[0].1.color, "white");
        assert_eq!(players[1].1.color, "orange");
    }

    #[tokio::test]
    async fn test_join_missing_lobby() {
        let lobbies = lobby_store();
        let result = lobbies.join_lobby("ZZZZZ", "guest01", "Bo").await;
        assert!(matches!(result, Err(LobbyError::NotFound(code)) if code == "ZZZZZ"));

        let result = lobbies.enter_game("ZZZZZ", "guest01", "Bo", 100.0, 300.0).await;
        assert!(matches!(result, Err(LobbyError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_join_full_lobby() {
        let lobbies = lobby_store();
        let code = lobbies.create_lobby("owner01", "Ada").await.unwrap();
        for i in 1..MAX_LOBBY_PLAYERS {
            lobbies
                .join_lobby(&code, &format!("guest{:02}", i), "Guest")
                .await
                .unwrap();
        }

        let result = lobbies.join_lobby(&code, "late", "Late").await;
        assert!(matches!(result, Err(LobbyError::Full { max: 10, .. })));

        // Someone already seated may rejoin
        assert!(lobbies.join_lobby(&code, "guest03", "Guest").await.is_ok());
    }

    #[tokio::test]
    async fn test_start_requires_owner_and_ready() {
        let lobbies = lobby_store();
        let code = lobbies.create_lobby("owner01", "Ada").await.unwrap();
        lobbies.join_lobby(&code, "guest01", "Bo").await.unwrap();

        assert!(matches!(
            lobbies.start(&code, "guest01").await,
            Err(LobbyError::NotOwner)
        ));

        lobbies.set_ready(&code, "owner01", true).await.unwrap();
        assert!(matches!(
            lobbies.start(&code, "owner01").await,
            Err(LobbyError::NotAllReady { ready: 1, total: 2 })
        ));

        lobbies.set_ready(&code, "guest01", true).await.unwrap();
        lobbies.start(&code, "owner01").await.unwrap();
        assert!(lobbies.get_lobby(&code).await.unwrap().unwrap().started);
    }

    #[tokio::test]
    async fn test_push_state_and_leave() {
        let lobbies = lobby_store();
        let code = lobbies.create_lobby("owner01", "Ada").await.unwrap();
        lobbies
            .enter_game(&code, "owner01", "Ada", 100.0, 300.0)
            .await
            .unwrap();

        lobbies.push_state(&code, "owner01", 100.0, 412.5, 7).await.unwrap();
        let players = lobbies.list_players(&code).await.unwrap();
        assert_eq!(players[0].1.y, 412.5);
        assert_eq!(players[0].1.score, 7);
        assert_eq!(players[0].1.color, "yellow");

        tokio_test::assert_ok!(lobbies.leave(&code, "owner01").await);
        assert!(lobbies.list_players(&code).await.unwrap().is_empty());
        // Leaving twice is harmless
        tokio_test::assert_ok!(lobbies.leave(&code, "owner01").await);
        // Pushing after leaving fails: the document is gone
        tokio_test::assert_err!(lobbies.push_state(&code, "owner01", 0.0, 0.0, 0).await);
    }
}
