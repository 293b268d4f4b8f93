//! Control panel errors.

use thiserror::Error;
use whale_app::RuntimeError;

/// Errors that end the control panel.
#[derive(Debug, Error)]
pub enum CliError {
    /// Terminal I/O failed
    #[error("terminal I/O: {0}")]
    Io(#[from] std::io::Error),

    /// The runtime stopped answering
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
