//! Line-based control panel for a whale pair
//!
//! A thin shell over [`whale_app::Runtime`]: parses slash commands from
//! stdin and prints notices, status and rendered rings to stdout. All pairing
//! logic lives in `whale-core`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod display;
pub mod error;

pub use commands::Command;
pub use error::CliError;
