//! Multiplayer state synchronization against the shared store

pub mod mirror;
pub mod synchronizer;
pub mod writer;

pub use mirror::{PeerMirror, PeerState, Standing};
pub use synchronizer::{StatePush, Synchronizer};
pub use writer::spawn_state_writer;
