//! Configuration watcher for hot reload.
//!
//! Observes a file (through `notify`) or an in-memory [`DynamicSource`] and
//! publishes a new [`OutputConfig`] snapshot each time the monitoring
//! section changes. The watcher knows nothing about sinks.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contracts::OutputConfig;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{ConfigFormat, ConfigLoader, SectionPath};

/// In-memory configuration document that can be replaced or deleted at
/// runtime.
#[derive(Debug, Clone)]
pub struct DynamicSource {
    format: ConfigFormat,
    tx: Arc<watch::Sender<Option<String>>>,
}

impl DynamicSource {
    pub fn new(content: Option<&str>, format: ConfigFormat) -> Self {
        let (tx, _) = watch::channel(content.map(str::to_string));
        Self {
            format,
            tx: Arc::new(tx),
        }
    }

    /// JSON source with an initial document
    pub fn json(content: &str) -> Self {
        Self::new(Some(content), ConfigFormat::Json)
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    /// Replaces the whole document
    pub fn set(&self, content: impl Into<String>) {
        self.tx.send_replace(Some(content.into()));
    }

    /// Removes the document
    pub fn delete(&self) {
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

/// Parses documents and forwards changed snapshots.
#[derive(Clone)]
struct Publisher {
    section: SectionPath,
    update_tx: mpsc::UnboundedSender<OutputConfig>,
    last: Arc<Mutex<Option<OutputConfig>>>,
    /// Documents that failed to parse
    rejected: Arc<AtomicU64>,
}

impl Publisher {
    /// Returns false once the receiving side is gone.
    fn publish(&self, content: Option<&str>, format: ConfigFormat) -> bool {
        let parsed = match content {
            Some(content) => match ConfigLoader::load_from_str(content, format, &self.section) {
                Ok(parsed) => parsed,
                Err(e) => {
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                    error!(error = %e, "Failed to reload config. Keeping current configuration.");
                    return !self.update_tx.is_closed();
                }
            },
            None => crate::ParsedConfig::implicit_default(),
        };

        for warning in &parsed.warnings {
            warn!(section = %self.section, warning = %warning, "Configuration entry ignored");
        }

        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if last.as_ref() == Some(&parsed.config) {
            debug!(section = %self.section, "Configuration unchanged");
            return !self.update_tx.is_closed();
        }
        *last = Some(parsed.config.clone());
        drop(last);

        info!(
            section = %self.section,
            handlers = parsed.config.len(),
            default = parsed.is_default,
            "Configuration snapshot published"
        );
        self.update_tx.send(parsed.config).is_ok()
    }
}

/// A watcher that turns configuration changes into snapshots.
pub struct ConfigWatcher {
    publisher: Publisher,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher for `section`.
    ///
    /// Returns the watcher and a receiver for snapshot updates.
    pub fn new(section: SectionPath) -> (Self, mpsc::UnboundedReceiver<OutputConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                publisher: Publisher {
                    section,
                    update_tx,
                    last: Arc::new(Mutex::new(None)),
                    rejected: Arc::new(AtomicU64::new(0)),
                },
            },
            update_rx,
        )
    }

    /// Number of documents ignored because they did not parse
    pub fn rejected_documents(&self) -> u64 {
        self.publisher.rejected.load(Ordering::Relaxed)
    }

    /// Publishes the current content of `path`, then watches it.
    ///
    /// The parent directory is watched so that deleting and re-creating the
    /// file are observed; a deleted file yields the default snapshot. The
    /// returned watcher must be kept alive.
    pub fn watch_file(&self, path: &Path) -> Result<RecommendedWatcher, notify::Error> {
        let format = ConfigLoader::detect_format(path)
            .map_err(|e| notify::Error::generic(&e.to_string()))?;
        let path = path.to_path_buf();
        let directory = parent_directory(&path);

        let publisher = self.publisher.clone();
        publisher.publish(read_optional(&path).as_deref(), format);

        let file_name = path.file_name().map(|n| n.to_os_string());
        let watched = path.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let concerns_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if concerns_file && !event.kind.is_access() {
                        info!(path = ?watched, kind = ?event.kind, "Config file change detected, reloading...");
                        publisher.publish(read_optional(&watched).as_deref(), format);
                    }
                }
                Err(e) => error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }

    /// Publishes the current document of `source`, then follows its changes
    /// until the source is dropped or the receiver closes.
    pub fn watch_source(&self, source: &DynamicSource) -> JoinHandle<()> {
        let publisher = self.publisher.clone();
        let format = source.format();
        let mut rx = source.subscribe();

        tokio::spawn(async move {
            let initial = rx.borrow_and_update().clone();
            if !publisher.publish(initial.as_deref(), format) {
                return;
            }
            while rx.changed().await.is_ok() {
                let content = rx.borrow_and_update().clone();
                if !publisher.publish(content.as_deref(), format) {
                    break;
                }
            }
            debug!(section = %publisher.section, "Dynamic configuration source closed");
        })
    }
}

fn parent_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn read_optional(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = ?path, error = %e, "Config file unreadable, treating as absent");
            }
            None
        }
    }
}
