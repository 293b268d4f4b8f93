//! Environment abstraction.
//!
//! State machines never read the clock themselves. Drivers ask an
//! [`Environment`] and pass the values in, so tests and simulations can run on
//! virtual time.

use std::{
    future::Future,
    time::{Duration, Instant},
};

/// Source of time for a runtime.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic now, used for response window deadlines.
    fn now(&self) -> Instant;

    /// Wall clock in unix milliseconds, used for touch timestamps, heartbeats
    /// and animation phase.
    fn unix_millis(&self) -> u64;

    /// Sleep for `duration` on this environment's clock.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}
