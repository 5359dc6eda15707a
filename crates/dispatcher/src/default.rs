//! Opt-in process-wide default [`GrandOutput`].
//!
//! Nothing creates it implicitly: call [`ensure_active_default`] at start
//! and [`dispose_default`] at the end. Components should prefer receiving
//! an explicit `GrandOutput`.

use std::sync::RwLock;

use contracts::OutputConfig;
use tracing::info;

use crate::error::DispatcherError;
use crate::grand_output::GrandOutput;
use crate::root::root_log_path;

static DEFAULT: RwLock<Option<GrandOutput>> = RwLock::new(None);

/// The default instance, if active
pub fn instance() -> Option<GrandOutput> {
    DEFAULT.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Returns the default instance, creating it under the process root log
/// path when needed. `config` (if any) is applied to it; a new instance
/// without `config` starts with the default text sink.
pub async fn ensure_active_default(
    config: Option<OutputConfig>,
) -> Result<GrandOutput, DispatcherError> {
    if let Some(output) = instance() {
        if let Some(config) = config {
            output.apply_configuration(config).await?;
        }
        return Ok(output);
    }

    let created = GrandOutput::builder()
        .root_log_path(root_log_path())
        .build();
    created
        .apply_configuration(config.unwrap_or_default())
        .await?;

    let winner = {
        let mut slot = DEFAULT.write().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(existing) => Some(existing.clone()),
            None => {
                *slot = Some(created.clone());
                None
            }
        }
    };
    match winner {
        // Lost a concurrent initialization.
        Some(existing) => {
            created.dispose().await;
            Ok(existing)
        }
        None => {
            info!(root = ?created.root_log_path(), "Default GrandOutput activated");
            Ok(created)
        }
    }
}

/// Disposes and forgets the default instance.
pub async fn dispose_default() {
    let taken = DEFAULT.write().unwrap_or_else(|e| e.into_inner()).take();
    if let Some(output) = taken {
        output.dispose().await;
        info!("Default GrandOutput disposed");
    }
}
