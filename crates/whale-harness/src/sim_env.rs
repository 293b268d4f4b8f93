//! Virtual clocks.
//!
//! [`SimEnv`] runs on tokio's clock, so a test using
//! `#[tokio::test(start_paused = true)]` advances it deterministically through
//! `tokio::time::advance` or by awaiting sleeps. [`SimClock`] is a plain
//! manual clock for driving the pure state machines without a runtime.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use whale_core::Environment;

/// Wall clock origin used when a test does not pick one: 2023-11-14T22:13:20Z.
pub const DEFAULT_WALL_ORIGIN_MS: u64 = 1_700_000_000_000;

/// Environment on tokio's (pausable) clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    origin: tokio::time::Instant,
    wall_origin_ms: u64,
}

impl SimEnv {
    /// Environment whose wall clock starts at [`DEFAULT_WALL_ORIGIN_MS`].
    pub fn new() -> Self {
        Self::with_wall_origin(DEFAULT_WALL_ORIGIN_MS)
    }

    /// Environment whose wall clock reads `wall_origin_ms` right now.
    pub fn with_wall_origin(wall_origin_ms: u64) -> Self {
        Self { origin: tokio::time::Instant::now(), wall_origin_ms }
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn unix_millis(&self) -> u64 {
        let elapsed = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.wall_origin_ms.saturating_add(elapsed)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug)]
struct ClockState {
    offset: Duration,
}

/// Manually advanced clock.
///
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct SimClock {
    origin: Instant,
    wall_origin_ms: u64,
    state: Arc<Mutex<ClockState>>,
}

impl SimClock {
    /// Clock at offset zero with the default wall origin.
    pub fn new() -> Self {
        Self::with_wall_origin(DEFAULT_WALL_ORIGIN_MS)
    }

    /// Clock at offset zero reading `wall_origin_ms`.
    pub fn with_wall_origin(wall_origin_ms: u64) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin_ms,
            state: Arc::new(Mutex::new(ClockState { offset: Duration::ZERO })),
        }
    }

    fn offset(&self) -> Duration {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).offset
    }

    /// Monotonic now.
    pub fn now(&self) -> Instant {
        self.origin + self.offset()
    }

    /// Instant `ms` milliseconds after the origin.
    pub fn at(&self, ms: u64) -> Instant {
        self.origin + Duration::from_millis(ms)
    }

    /// Wall clock in unix milliseconds.
    pub fn wall_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.offset().as_millis()).unwrap_or(u64::MAX);
        self.wall_origin_ms.saturating_add(elapsed)
    }

    /// Time since the origin.
    pub fn elapsed(&self) -> Duration {
        self.offset()
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.offset += by;
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}
