//! Deterministic simulation harness for whale pairing tests.
//!
//! In-memory implementations of the Environment and Transport traits for
//! deterministic, reproducible testing under connection loss, broker outages
//! and message loss.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod memory_broker;
pub mod model;
pub mod recording;
pub mod scenario;
pub mod sim_env;

pub use memory_broker::{MemoryBroker, MemoryHandle, MemoryTransport, Published, topic_matches};
pub use model::{ModelWorld, ObservableState, Operation, OperationResult};
pub use recording::{RecordingHandle, RecordingTransport, TransportCall};
pub use sim_env::{SimClock, SimEnv};
