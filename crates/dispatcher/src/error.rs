//! Dispatcher error types

use std::path::PathBuf;
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// The output was disposed, it accepts no new configuration
    #[error("grand output is disposed")]
    Disposed,

    /// The process-wide root log path is set once
    #[error("root log path is already set to '{}'", current.display())]
    RootPathAlreadySet { current: PathBuf },

    /// Sink error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
