//! Rate-gated publishing of joystick events

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use super::JoystickEvent;

/// Default sampler cadence; also the minimum spacing between publishes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default pause after a failed publish
pub const DEFAULT_PUBLISH_BACKOFF: Duration = Duration::from_secs(1);

type Gate<C> = RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Timing policy for a sampling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishPolicy {
    pub poll_interval: Duration,
    pub backoff: Duration,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            backoff: DEFAULT_PUBLISH_BACKOFF,
        }
    }
}

/// What happened to a published event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    Sent,
    /// Inside the minimum publish interval
    Throttled,
    /// Relay busy; the sample is discarded rather than queued
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("relay channel closed")]
    Closed,
}

/// Publishes one source's events, at most one per interval.
pub struct Publisher<C: Clock = DefaultClock> {
    gate: Gate<C>,
    events: mpsc::Sender<JoystickEvent>,
}

impl Publisher<DefaultClock> {
    pub fn new(events: mpsc::Sender<JoystickEvent>, min_interval: Duration) -> Self {
        Self::with_clock(events, min_interval, &DefaultClock::default())
    }
}

impl<C: Clock> Publisher<C> {
    pub fn with_clock(events: mpsc::Sender<JoystickEvent>, min_interval: Duration, clock: &C) -> Self {
        let quota = Quota::with_period(min_interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));

        Self {
            gate: RateLimiter::direct_with_clock(quota, clock),
            events,
        }
    }

    /// Hand an event to the relay without waiting.
    pub fn publish(&self, event: JoystickEvent) -> Result<Publish, PublishError> {
        if self.events.is_closed() {
            return Err(PublishError::Closed);
        }

        if self.gate.check().is_err() {
            return Ok(Publish::Throttled);
        }

        match self.events.try_send(event) {
            Ok(()) => Ok(Publish::Sent),
            Err(TrySendError::Full(event)) => {
                debug!(source = %event.source, "Relay busy, dropping joystick sample");
                Ok(Publish::Dropped)
            }
            Err(TrySendError::Closed(_)) => Err(PublishError::Closed),
        }
    }
}
