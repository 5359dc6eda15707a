//! Process-wide root log directory.
//!
//! Set once at process start (CLI, default instance); explicitly built
//! [`GrandOutput`](crate::GrandOutput)s receive their own root instead.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::DispatcherError;

static ROOT_LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Sets the root log path.
///
/// # Errors
/// `RootPathAlreadySet` when a different path was set (or read) before.
pub fn set_root_log_path(path: impl AsRef<Path>) -> Result<(), DispatcherError> {
    let path = path.as_ref().to_path_buf();
    let current = ROOT_LOG_PATH.get_or_init(|| path.clone());
    if *current == path {
        Ok(())
    } else {
        Err(DispatcherError::RootPathAlreadySet {
            current: current.clone(),
        })
    }
}

/// The root log path; defaults to `./Logs` when never set.
pub fn root_log_path() -> &'static Path {
    ROOT_LOG_PATH.get_or_init(|| {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("Logs")
    })
}
