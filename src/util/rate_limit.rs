//! Rate limiting for browser input

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Create a limiter admitting one event per `period`, no burst
pub fn create_cooldown(period: Duration) -> Arc<Limiter> {
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Max WebSocket messages per second per connection
pub const INPUT_RATE_LIMIT: u32 = 30;

/// Minimum spacing between motion-triggered flaps
pub const MOTION_FLAP_COOLDOWN: Duration = Duration::from_millis(200);

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct InputRateLimiter {
    input_limiter: Arc<Limiter>,
    motion_limiter: Arc<Limiter>,
}

impl InputRateLimiter {
    pub fn new() -> Self {
        Self {
            input_limiter: create_limiter(INPUT_RATE_LIMIT),
            motion_limiter: create_cooldown(MOTION_FLAP_COOLDOWN),
        }
    }

    /// Check if an input message is allowed (returns true if allowed)
    pub fn check_input(&self) -> bool {
        self.input_limiter.check().is_ok()
    }

    /// Motion detectors fire on every frame a gesture is held; only the
    /// first detection per cooldown window becomes a flap.
    pub fn check_motion_flap(&self) -> bool {
        self.motion_limiter.check().is_ok()
    }
}

impl Default for InputRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
