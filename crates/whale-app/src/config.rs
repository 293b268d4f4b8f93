//! Runtime configuration.

use std::time::Duration;

use whale_core::{RenderConfig, SessionConfig};

/// Everything [`crate::Runtime::spawn`] needs besides the transport and clock.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Session parameters
    pub session: SessionConfig,
    /// Renderer parameters
    pub render: RenderConfig,
    /// Time between rendered frames
    pub frame_interval: Duration,
    /// Publish an online heartbeat this often while connected
    pub heartbeat_interval: Option<Duration>,
    /// Start connecting as soon as the runtime is spawned
    pub auto_start: bool,
    /// Buffered control commands before senders wait
    pub command_capacity: usize,
    /// Notices kept for slow subscribers before they lag
    pub notice_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            render: RenderConfig::default(),
            frame_interval: Duration::from_millis(16),
            heartbeat_interval: None,
            auto_start: true,
            command_capacity: 32,
            notice_capacity: 128,
        }
    }
}
