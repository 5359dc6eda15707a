//! Registry of sink factories, keyed by kind.
//!
//! An entry resolves by its declared `ConfigurationType` first, then by its
//! own name, so `"TextFile": { ... }` works without any declared kind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::{ContractError, LogSink, SinkEntry, BINARY_FILE_KIND, TEXT_FILE_KIND};
use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;

use crate::handle::{PendingSink, SinkHandle};
use crate::sinks::{BinaryFileSink, TextFileSink, TracingSink, TRACING_KIND};

/// What every sink factory receives besides its entry.
#[derive(Debug, Clone)]
pub struct OutputContext {
    /// Base directory of file sinks
    pub root_log_path: PathBuf,
}

impl OutputContext {
    pub fn new(root_log_path: impl Into<PathBuf>) -> Self {
        Self {
            root_log_path: root_log_path.into(),
        }
    }

    /// `relative` under the root; absolute paths are kept as is.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root_log_path.join(relative)
    }
}

/// Activation of a built sink; resolves to its running worker
pub(crate) type ActivateFuture = BoxFuture<'static, Result<JoinHandle<()>, ContractError>>;

type SinkFactory = Arc<
    dyn Fn(&SinkEntry, &OutputContext, PendingSink) -> Result<ActivateFuture, ContractError>
        + Send
        + Sync,
>;

/// Kind string → sink constructor.
#[derive(Clone, Default)]
pub struct SinkRegistry {
    factories: BTreeMap<String, SinkFactory>,
}

impl SinkRegistry {
    /// Registry without any kind
    pub fn empty() -> Self {
        Self::default()
    }

    /// `TextFile`, `BinaryFile` and `Tracing`
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(TEXT_FILE_KIND, TextFileSink::from_entry);
        registry.register(BINARY_FILE_KIND, BinaryFileSink::from_entry);
        registry.register(TRACING_KIND, |entry, _| Ok(TracingSink::new(&entry.name)));
        registry
    }

    /// Registers (or replaces) the constructor of `kind`.
    ///
    /// `build` receives the whole entry, extra options included, and may
    /// reject it with a configuration error.
    pub fn register<S, F>(&mut self, kind: impl Into<String>, build: F)
    where
        S: LogSink + Send + 'static,
        F: Fn(&SinkEntry, &OutputContext) -> Result<S, ContractError> + Send + Sync + 'static,
    {
        let factory: SinkFactory = Arc::new(
            move |entry: &SinkEntry,
                  context: &OutputContext,
                  pending: PendingSink|
                  -> Result<ActivateFuture, ContractError> {
                let sink = build(entry, context)?;
                Ok(Box::pin(pending.start(sink)))
            },
        );
        self.factories.insert(kind.into(), factory);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.lookup(kind).is_some()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Builds the sink of `entry` behind a pending handle.
    ///
    /// The handle queues lines at once; the sink only sees them after the
    /// returned activation completes.
    pub(crate) fn prepare(
        &self,
        entry: &SinkEntry,
        context: &OutputContext,
    ) -> Result<(SinkHandle, ActivateFuture), ContractError> {
        let (kind, factory) = self.resolve(entry)?;
        let (handle, pending) = SinkHandle::pending(&entry.name, kind);
        let activation = factory(entry, context, pending)?;
        Ok((handle, activation))
    }

    fn resolve(&self, entry: &SinkEntry) -> Result<(&str, &SinkFactory), ContractError> {
        entry
            .kind_candidates()
            .find_map(|candidate| self.lookup(candidate))
            .ok_or_else(|| {
                ContractError::unknown_sink_kind(
                    &entry.name,
                    entry.declared_kind.as_deref().unwrap_or(&entry.name),
                )
            })
    }

    /// Exact match first, then ASCII case-insensitive.
    fn lookup(&self, kind: &str) -> Option<(&str, &SinkFactory)> {
        self.factories
            .get_key_value(kind)
            .or_else(|| {
                self.factories
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(kind))
            })
            .map(|(k, f)| (k.as_str(), f))
    }
}

impl std::fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
