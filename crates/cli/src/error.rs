//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration could not be turned into a snapshot
    #[error("Failed to parse configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: contracts::ContractError,
    },

    /// Configuration parsed with ignored entries
    #[error("Configuration has {count} ignored entries")]
    ConfigWarnings { count: usize },

    /// Binary log file could not be read
    #[error("Failed to read binary log {path}: {source}")]
    BinaryLog {
        path: PathBuf,
        #[source]
        source: contracts::ContractError,
    },

    /// Root log directory already fixed
    #[error(transparent)]
    Dispatcher(#[from] dispatcher::DispatcherError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_parse(path: impl Into<PathBuf>, source: contracts::ContractError) -> Self {
        Self::ConfigParse {
            path: path.into(),
            source,
        }
    }

    pub fn binary_log(path: impl Into<PathBuf>, source: contracts::ContractError) -> Self {
        Self::BinaryLog {
            path: path.into(),
            source,
        }
    }
}
