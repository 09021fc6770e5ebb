//! WebSocket transport between the browser and the session

pub mod handler;
pub mod protocol;
