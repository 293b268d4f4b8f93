//! Application runtime for whale pairing
//!
//! Drives a [`whale_core::Session`] on tokio with a single-writer discipline
//! and exposes its state as signals.
//!
//! # Components
//!
//! - [`Runtime`]: Spawns the session task and the render loop
//! - [`RuntimeHandle`]: Signals (`watch` snapshots, connection state, frames;
//!   `broadcast` notices) and teardown
//! - [`ControlHandle`]: Commands from the control surface
//! - [`SystemEnv`]: Real clocks for production

mod config;
mod env;
mod error;
mod handle;
mod render_task;
mod runtime;

pub use config::RuntimeConfig;
pub use env::SystemEnv;
pub use error::RuntimeError;
pub use handle::ControlHandle;
pub use render_task::spawn_render;
pub use runtime::{Runtime, RuntimeHandle};
