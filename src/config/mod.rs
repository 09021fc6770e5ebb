//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;

use crate::game::GameMode;
use crate::store::firestore::FirestoreConfig;

const PLAYER_ID_LENGTH: usize = 7;

/// Which document store backs lobbies
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local store; lobbies only span this process
    Memory,
    Firestore(FirestoreConfig),
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma-separated
    pub client_origin: String,

    pub game_mode: GameMode,
    pub world_width: f32,
    pub world_height: f32,
    /// Fixed seed for pipe layouts; random if unset
    pub rng_seed: Option<u64>,

    pub player_id: String,
    pub player_name: String,
    /// Lobby to enter at startup (multiplayer)
    pub lobby_code: Option<String>,

    pub store_backend: StoreBackend,
    /// How often the lobby's player list is re-read
    pub peer_poll: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let game_mode = match env::var("GAME_MODE") {
            Ok(raw) => GameMode::from_str(&raw).map_err(ConfigError::InvalidMode)?,
            Err(_) => GameMode::default(),
        };

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "firestore" => StoreBackend::Firestore(FirestoreConfig {
                project_id: env::var("FIRESTORE_PROJECT_ID")
                    .map_err(|_| ConfigError::Missing("FIRESTORE_PROJECT_ID"))?,
                api_key: env::var("FIRESTORE_API_KEY").ok(),
                base_url: env::var("FIRESTORE_BASE_URL").ok(),
            }),
            other => return Err(ConfigError::InvalidBackend(other.to_string())),
        };

        let player_id = env::var("PLAYER_ID").unwrap_or_else(|_| random_player_id());

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),

            game_mode,
            world_width: parse_var("WORLD_WIDTH", 1280.0)?,
            world_height: parse_var("WORLD_HEIGHT", 800.0)?,
            rng_seed: parse_optional("RNG_SEED")?,

            player_name: env::var("PLAYER_NAME").unwrap_or_default(),
            player_id,
            lobby_code: env::var("LOBBY_CODE")
                .ok()
                .map(|code| code.trim().to_uppercase())
                .filter(|code| !code.is_empty()),

            store_backend,
            peer_poll: Duration::from_millis(parse_var("PEER_POLL_MS", 250)?),
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(parse_optional(name)?.unwrap_or(default))
}

fn parse_optional<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(None),
    }
}

/// Short random id, lower-case base 36
pub fn random_player_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..PLAYER_ID_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid GAME_MODE: {0}")]
    InvalidMode(String),

    #[error("Unknown STORE_BACKEND '{0}' (expected memory or firestore)")]
    InvalidBackend(String),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_player_id() {
        let id = random_player_id();
        assert_eq!(id.len(), PLAYER_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_parse_var_default() {
        let value: u64 = parse_var("FEATHER_DASH_UNSET_TEST_VAR", 250).unwrap();
        assert_eq!(value, 250);
    }
}
