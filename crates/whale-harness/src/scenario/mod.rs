//! Scenario testing with mandatory oracles.
//!
//! A scenario scripts steps against one session on a virtual clock. It
//! cannot be run without an oracle that checks the final world.

mod builder;
mod world;

pub use builder::{RunnableScenario, Scenario, Step};
pub use world::World;

/// Verification function run after the last step.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
