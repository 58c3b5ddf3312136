//! Inbound rate limiting

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default inbound frames per second per connection. A remote relay
/// forwarding joystick data at 50 ms needs 20 of these.
pub const INPUT_RATE_LIMIT: u32 = 60;

/// Per-connection inbound limiter
pub struct ConnectionRateLimiter {
    limiter: Limiter,
}

impl ConnectionRateLimiter {
    pub fn new(frames_per_second: u32) -> Self {
        let quota =
            Quota::per_second(NonZeroU32::new(frames_per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Returns true if another frame is allowed now
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for ConnectionRateLimiter {
    fn default() -> Self {
        Self::new(INPUT_RATE_LIMIT)
    }
}
