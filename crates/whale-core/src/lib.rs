//! Whale pairing core logic
//!
//! Pure state machine logic for keeping two whales and a control surface in
//! sync, completely decoupled from I/O.
//!
//! # Architecture
//!
//! Every component here is a deterministic state machine. Nothing reads a
//! clock, spawns a task, or touches the network. Time is passed in by the
//! caller and every transition returns declarative actions (open the
//! transport, publish this payload, schedule that expiry) for a runtime or
//! test harness to execute.
//!
//! Because all shared state lives in one [`Session`] value and is only
//! mutated through its methods, a runtime that drives a session from a single
//! task gets the "one writer, atomic snapshots" guarantee for free.
//!
//! # Components
//!
//! - [`connection`]: Connection lifecycle (connect, subscribe, loss, retry)
//! - [`coordinator`]: Pairing rule and outbound intents
//! - [`scheduler`]: Per-peer response windows with cancellable expiries
//! - [`render`]: Indicator colors as a pure function of time and state
//! - [`session`]: Aggregate owning all of the above
//! - [`mod@env`]: Environment abstraction (time)
//! - [`transport`]: Publish/subscribe transport abstraction
//! - [`error`]: Error types

pub mod action;
pub mod connection;
pub mod coordinator;
pub mod env;
pub mod error;
pub mod notice;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use action::SessionAction;
pub use connection::{Connection, ConnectionAction, ConnectionState};
pub use coordinator::{Coordinator, Outcome, PublishStatus, SessionStats};
pub use env::Environment;
pub use error::{ConnectionError, TransportError};
pub use notice::{Notice, NoticeLevel};
pub use render::{Indicator, RenderConfig, RenderFrame, Ring, render_frame};
pub use scheduler::{ResponseScheduler, ResponseWindow, SchedulerAction, TimerId};
pub use session::{Session, SessionConfig, Snapshot};
pub use transport::{ConnectOptions, Transport, TransportEvent, TransportHandle};
