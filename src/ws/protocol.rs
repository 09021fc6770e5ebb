//! WebSocket protocol message definitions
//! These are the wire types between the browser front-end and the core

use serde::{Deserialize, Serialize};

use crate::game::mode::GameMode;
use crate::game::round::{CountdownDisplay, Requirement, RoundEvent, RoundPhase};
use crate::game::snapshot::{RoundOutcome, RoundSnapshot};

/// Where a flap request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlapSource {
    /// Space bar or tap
    #[default]
    Key,
    /// Hand-raise detected by the camera pose tracker
    Motion,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Flap requested
    Flap {
        #[serde(default)]
        source: FlapSource,
    },

    /// A start precondition is satisfied on the client side
    Ready { requirement: Requirement },

    /// Camera access was refused; the round cannot start
    CaptureDenied {
        #[serde(default)]
        reason: String,
    },

    /// Play again
    Restart,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        player_id: String,
        mode: GameMode,
        server_time: u64,
    },

    /// Round phase changed
    Phase { phase: RoundPhase },

    /// Countdown overlay changed
    Countdown { display: CountdownDisplay },

    /// Round state for rendering, with the events since the last one
    Snapshot {
        snapshot: Box<RoundSnapshot>,
        events: Vec<RoundEvent>,
    },

    /// Round finished
    RoundEnd { outcome: RoundOutcome },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
