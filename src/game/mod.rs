//! Game simulation modules

pub mod actor;
pub mod collision;
pub mod mode;
pub mod obstacles;
pub mod physics;
pub mod round;
pub mod session;
pub mod snapshot;

pub use mode::{GameMode, RoundConfig, World};
pub use round::{Requirement, Round, RoundPhase};
pub use session::{GameSession, SessionHandle, SessionInput, SessionSettings};
pub use snapshot::{RoundOutcome, RoundSnapshot};
