//! Time utilities for the round clock

use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Process start, the zero of the monotonic clock
static SERVER_START: OnceLock<Instant> = OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Milliseconds since startup. Round deadlines and freezes are measured
/// on this clock so wall-clock jumps cannot shorten or stretch a round.
pub fn monotonic_millis() -> u64 {
    SERVER_START.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Simulation rate; the motion constants are tuned per 60 Hz frame
pub const SIMULATION_TPS: u32 = 60;
/// Render snapshots per second
pub const SNAPSHOT_TPS: u32 = 30;

/// Tick period of the simulation loop
pub fn tick_duration() -> Duration {
    Duration::from_micros(1_000_000 / SIMULATION_TPS as u64)
}
