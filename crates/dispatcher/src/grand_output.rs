//! GrandOutput - routes log lines to the active sinks and reconciles them
//! with configuration snapshots

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use arc_swap::ArcSwap;
use contracts::{
    ContractError, ErrorInfo, LogClock, LogLevel, LogLine, LogSink, OutputConfig, SinkEntry,
};
use futures_util::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::critical::{error_info, PanicError};
use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::monitor::Monitor;
use crate::registry::{ActivateFuture, OutputContext, SinkRegistry};

/// Tag of the lines GrandOutput emits about itself
pub const GRAND_OUTPUT_TAG: &str = "GrandOutput";

/// Tag of critical error lines
pub const CRITICAL_ERROR_TAG: &str = "CriticalError";

/// Sinks receiving lines right now. Replaced as a whole, never mutated.
#[derive(Default)]
struct ActiveView {
    sinks: Vec<Arc<SinkHandle>>,
}

/// A sink owned by the transition state
struct LiveSink {
    entry: SinkEntry,
    handle: Arc<SinkHandle>,
    worker: JoinHandle<()>,
}

impl LiveSink {
    /// Drops the sending side and waits until every queued line is handled
    /// and the sink is deactivated.
    async fn retire(self) {
        let name = self.entry.name;
        drop(self.handle);
        if let Err(e) = self.worker.await {
            error!(sink = %name, error = ?e, "Sink worker panicked");
        }
        debug!(sink = %name, "Sink deactivated");
    }
}

#[derive(Default)]
struct TransitionState {
    live: BTreeMap<String, LiveSink>,
    disposed: bool,
}

struct Inner {
    context: OutputContext,
    registry: SinkRegistry,
    view: ArcSwap<ActiveView>,
    transition: Mutex<TransitionState>,
    clock: LogClock,
    handle_critical_errors: AtomicBool,
    external_filter: RwLock<LogLevel>,
}

/// What a reconciliation did, by sink name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Names that were absent (or faulted) and are now active
    pub activated: Vec<String>,
    /// Names whose entry changed, old instance replaced
    pub applied: Vec<String>,
    /// Names no longer active
    pub deactivated: Vec<String>,
    /// Names kept as they were
    pub unchanged: Vec<String>,
    /// Names whose activation failed, with the reason
    pub failed: Vec<(String, String)>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Builder for creating a GrandOutput
pub struct GrandOutputBuilder {
    root_log_path: Option<PathBuf>,
    registry: SinkRegistry,
    handle_critical_errors: bool,
    external_filter: LogLevel,
}

impl Default for GrandOutputBuilder {
    fn default() -> Self {
        Self {
            root_log_path: None,
            registry: SinkRegistry::with_builtin(),
            handle_critical_errors: false,
            external_filter: LogLevel::Trace,
        }
    }
}

impl GrandOutputBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base directory of file sinks; the process-wide root when not set
    pub fn root_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_log_path = Some(path.into());
        self
    }

    /// Replaces the whole registry (built-in kinds included)
    pub fn registry(mut self, registry: SinkRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Adds a custom sink kind
    pub fn register<S, F>(mut self, kind: impl Into<String>, build: F) -> Self
    where
        S: LogSink + Send + 'static,
        F: Fn(&SinkEntry, &OutputContext) -> Result<S, ContractError> + Send + Sync + 'static,
    {
        self.registry.register(kind, build);
        self
    }

    pub fn handle_critical_errors(mut self, enabled: bool) -> Self {
        self.handle_critical_errors = enabled;
        self
    }

    /// Filter of external (monitor-less) lines
    pub fn minimal_filter(mut self, level: LogLevel) -> Self {
        self.external_filter = level;
        self
    }

    /// Build the output. No sink is active until the first
    /// [`GrandOutput::apply_configuration`].
    pub fn build(self) -> GrandOutput {
        let root = self
            .root_log_path
            .unwrap_or_else(|| crate::root::root_log_path().to_path_buf());
        GrandOutput {
            inner: Arc::new(Inner {
                context: OutputContext::new(root),
                registry: self.registry,
                view: ArcSwap::from_pointee(ActiveView::default()),
                transition: Mutex::new(TransitionState::default()),
                clock: LogClock::new(),
                handle_critical_errors: AtomicBool::new(self.handle_critical_errors),
                external_filter: RwLock::new(self.external_filter),
            }),
        }
    }
}

/// The dispatcher: owns the active sink set.
///
/// Cheap to clone; every clone drives the same sinks.
#[derive(Clone)]
pub struct GrandOutput {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for GrandOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrandOutput")
            .field("root_log_path", &self.inner.context.root_log_path)
            .field("sinks", &self.sink_names())
            .finish()
    }
}

impl GrandOutput {
    pub fn builder() -> GrandOutputBuilder {
        GrandOutputBuilder::new()
    }

    /// Output writing under `root_log_path` with the built-in sink kinds
    pub fn new(root_log_path: impl Into<PathBuf>) -> Self {
        Self::builder().root_log_path(root_log_path).build()
    }

    pub fn root_log_path(&self) -> &std::path::Path {
        &self.inner.context.root_log_path
    }

    /// Same underlying output
    pub fn ptr_eq(&self, other: &GrandOutput) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Reconciles the active sinks with `config`.
    ///
    /// Only one reconciliation runs at a time. A changed entry deactivates
    /// its old instance (after its queued lines are handled) before the new
    /// one activates; lines emitted meanwhile wait in the new instance's
    /// queue. New entries are activated before the view used by fan-out is
    /// swapped, removed ones deactivated after. An empty snapshot means the
    /// default text sink. A failing entry is excluded and reported; it never
    /// fails the whole call.
    ///
    /// # Errors
    /// `Disposed` once [`dispose`](Self::dispose) ran.
    #[instrument(
        name = "grand_output_apply_configuration",
        skip(self, config),
        fields(handlers = config.len())
    )]
    pub async fn apply_configuration(
        &self,
        config: OutputConfig,
    ) -> Result<ReconcileReport, DispatcherError> {
        let mut state = self.inner.transition.lock().await;
        if state.disposed {
            return Err(DispatcherError::Disposed);
        }
        let started = Instant::now();

        if let Some(enabled) = config.handle_critical_errors {
            self.set_handle_critical_errors(enabled);
        }
        if let Some(level) = config.minimal_filter {
            self.set_minimal_filter(level);
        }
        let config = if config.is_empty() {
            OutputConfig::default_text()
        } else {
            config
        };

        let mut report = ReconcileReport::default();
        let mut previous = std::mem::take(&mut state.live);
        let mut next = BTreeMap::new();
        let mut retired = Vec::new();
        let mut announcements = Vec::new();

        for entry in config.entries() {
            // A faulted sink with an unchanged entry is reactivated.
            let old = match previous.remove(&entry.name) {
                Some(live) if live.entry == *entry && !live.handle.metrics().is_faulted() => {
                    report.unchanged.push(entry.name.clone());
                    next.insert(entry.name.clone(), live);
                    continue;
                }
                old => old,
            };

            let activated = match old {
                Some(old) => {
                    let replaced = old.entry != *entry;
                    let announcement = if replaced {
                        format!("Applying: {} => {}.", old.entry, entry)
                    } else {
                        format!("Activating: {entry}.")
                    };
                    match self.replace_entry(old, entry).await {
                        Ok(live) => {
                            announcements.push(announcement);
                            if replaced {
                                report.applied.push(entry.name.clone());
                            } else {
                                report.activated.push(entry.name.clone());
                            }
                            Ok(live)
                        }
                        Err(e) => {
                            report.deactivated.push(entry.name.clone());
                            Err(e)
                        }
                    }
                }
                None => {
                    let activated = self.activate_entry(entry).await;
                    if activated.is_ok() {
                        announcements.push(format!("Activating: {entry}."));
                        report.activated.push(entry.name.clone());
                    }
                    activated
                }
            };
            match activated {
                Ok(live) => {
                    next.insert(entry.name.clone(), live);
                }
                Err(e) => {
                    error!(sink = %entry.name, error = %e, "Sink activation failed, sink excluded");
                    report.failed.push((entry.name.clone(), e.to_string()));
                }
            }
        }
        for (name, live) in previous {
            report.deactivated.push(name);
            retired.push(live);
        }

        let view = ActiveView {
            sinks: next.values().map(|live| Arc::clone(&live.handle)).collect(),
        };
        let active = view.sinks.len();
        self.inner.view.store(Arc::new(view));
        state.live = next;

        for text in announcements {
            self.emit_own(LogLevel::Info, text);
        }
        for live in retired {
            live.retire().await;
        }

        observability::record_reconfiguration(
            active,
            report.failed.len(),
            started.elapsed().as_secs_f64() * 1000.0,
        );
        info!(
            active,
            activated = report.activated.len(),
            applied = report.applied.len(),
            deactivated = report.deactivated.len(),
            failed = report.failed.len(),
            "Configuration applied"
        );
        Ok(report)
    }

    async fn activate_entry(&self, entry: &SinkEntry) -> Result<LiveSink, ContractError> {
        let (handle, activation) = self.inner.registry.prepare(entry, &self.inner.context)?;
        self.start_entry(entry, Arc::new(handle), activation).await
    }

    /// Replaces `old` by a new instance of `entry` under the same name.
    ///
    /// The new handle takes the old one's place in the view first, so lines
    /// keep queueing for the name. The old instance is then drained and
    /// deactivated before the new one activates: two instances never hold
    /// the sink's resources at once. A failed activation leaves the name
    /// out of the view.
    async fn replace_entry(
        &self,
        old: LiveSink,
        entry: &SinkEntry,
    ) -> Result<LiveSink, ContractError> {
        let prepared = self.inner.registry.prepare(entry, &self.inner.context);
        let (handle, activation) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.swap_in_view(&old.handle, None);
                old.retire().await;
                return Err(e);
            }
        };
        let handle = Arc::new(handle);
        self.swap_in_view(&old.handle, Some(Arc::clone(&handle)));
        old.retire().await;

        let started = self.start_entry(entry, Arc::clone(&handle), activation).await;
        if started.is_err() {
            self.swap_in_view(&handle, None);
        }
        started
    }

    async fn start_entry(
        &self,
        entry: &SinkEntry,
        handle: Arc<SinkHandle>,
        activation: ActivateFuture,
    ) -> Result<LiveSink, ContractError> {
        let result = activation.await;
        observability::record_sink_activation(handle.kind(), result.is_ok());
        let worker = result?;
        debug!(sink = %entry.name, kind = %handle.kind(), "Sink activated");
        Ok(LiveSink {
            entry: entry.clone(),
            handle,
            worker,
        })
    }

    /// Publishes the current view with `current` replaced (or removed).
    fn swap_in_view(&self, current: &Arc<SinkHandle>, replacement: Option<Arc<SinkHandle>>) {
        let view = self.inner.view.load();
        let sinks = view
            .sinks
            .iter()
            .filter_map(|sink| {
                if Arc::ptr_eq(sink, current) {
                    replacement.clone()
                } else {
                    Some(Arc::clone(sink))
                }
            })
            .collect();
        self.inner.view.store(Arc::new(ActiveView { sinks }));
    }

    /// Fans `line` out to the sinks active at this instant.
    pub fn dispatch(&self, line: LogLine) {
        let level = line.level;
        let line = Arc::new(line);
        let view = self.inner.view.load();
        for sink in &view.sinks {
            sink.send(Arc::clone(&line));
        }
        observability::record_line_dispatched(level, view.sinks.len());
    }

    fn emit_own(&self, level: LogLevel, text: String) {
        self.dispatch(
            LogLine::new(level, self.inner.clock.next(), text).with_tags(GRAND_OUTPUT_TAG),
        );
    }

    /// Logs a line that belongs to no monitor.
    ///
    /// Returns false when the line was filtered out.
    pub fn external_log(
        &self,
        level: LogLevel,
        text: impl Into<String>,
        error: Option<ErrorInfo>,
    ) -> bool {
        if !self.is_external_log_enabled(level) {
            return false;
        }
        let mut line = LogLine::new(level, self.inner.clock.next(), text);
        if let Some(error) = error {
            line = line.with_error(error);
        }
        self.dispatch(line);
        true
    }

    pub fn is_external_log_enabled(&self, level: LogLevel) -> bool {
        level.passes(self.minimal_filter())
    }

    pub fn minimal_filter(&self) -> LogLevel {
        *self
            .inner
            .external_filter
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_minimal_filter(&self, level: LogLevel) {
        *self
            .inner
            .external_filter
            .write()
            .unwrap_or_else(|e| e.into_inner()) = level;
    }

    pub fn handle_critical_errors(&self) -> bool {
        self.inner.handle_critical_errors.load(Ordering::Acquire)
    }

    pub fn set_handle_critical_errors(&self, enabled: bool) {
        self.inner
            .handle_critical_errors
            .store(enabled, Ordering::Release);
    }

    /// Funnels a fault that happened outside any monitor.
    ///
    /// Emitted as a Fatal line without monitor identity when the channel is
    /// enabled, dropped otherwise. Returns whether it was emitted.
    pub fn report_critical_error(&self, text: impl Into<String>, error: ErrorInfo) -> bool {
        let enabled = self.handle_critical_errors();
        observability::record_critical_error(enabled);
        if !enabled {
            debug!(error = %error, "Critical error dropped (channel disabled)");
            return false;
        }
        self.dispatch(
            LogLine::new(LogLevel::Fatal, self.inner.clock.next(), text)
                .with_error(error)
                .with_tags(CRITICAL_ERROR_TAG),
        );
        true
    }

    /// Spawns a background task whose error or panic is reported as a
    /// critical error.
    pub fn spawn_background<F>(&self, name: impl Into<String>, task: F) -> JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let output = self.clone();
        let name = name.into();
        tokio::spawn(async move {
            let info = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => error_info(&e),
                Err(payload) => {
                    let panic = PanicError::from_payload(payload.as_ref());
                    ErrorInfo::new(panic.to_string())
                }
            };
            warn!(task = %name, error = %info, "Background task faulted");
            output.report_critical_error(format!("Background task '{name}' faulted."), info);
        })
    }

    /// Applies every snapshot received on `rx` until it closes or the
    /// output is disposed.
    pub fn follow(&self, mut rx: mpsc::UnboundedReceiver<OutputConfig>) -> JoinHandle<()> {
        let output = self.clone();
        tokio::spawn(async move {
            while let Some(config) = rx.recv().await {
                match output.apply_configuration(config).await {
                    Ok(report) if !report.is_clean() => {
                        warn!(failed = ?report.failed, "Snapshot partially applied");
                    }
                    Ok(_) => {}
                    Err(DispatcherError::Disposed) => break,
                    Err(e) => error!(error = %e, "Failed to apply snapshot"),
                }
            }
            debug!("Stopped following configuration snapshots");
        })
    }

    /// Makes this output the delivery target of `monitor`.
    ///
    /// Returns true when the monitor was not attached here yet.
    pub fn ensure_grand_output_client(&self, monitor: &Monitor) -> bool {
        monitor.attach(self.clone())
    }

    /// New monitor delivering to this output
    pub fn create_monitor(&self) -> Monitor {
        let monitor = Monitor::new();
        monitor.attach(self.clone());
        monitor
    }

    /// Names of the sinks in the current view
    pub fn sink_names(&self) -> Vec<String> {
        self.inner
            .view
            .load()
            .sinks
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Get metrics for all active sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.inner
            .view
            .load()
            .sinks
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Deactivates every sink; later reconfigurations fail with `Disposed`.
    /// Lines dispatched afterwards reach no sink.
    #[instrument(name = "grand_output_dispose", skip(self))]
    pub async fn dispose(&self) {
        let mut state = self.inner.transition.lock().await;
        if state.disposed {
            return;
        }
        state.disposed = true;
        self.inner.view.store(Arc::new(ActiveView::default()));
        let live = std::mem::take(&mut state.live);
        for (_, sink) in live {
            sink.retire().await;
        }
        info!("GrandOutput disposed");
    }

    pub async fn is_disposed(&self) -> bool {
        self.inner.transition.lock().await.disposed
    }
}

/// Convenience function to create an output and apply a first snapshot
#[instrument(name = "grand_output_create", skip(root_log_path, config))]
pub async fn create_grand_output(
    root_log_path: impl Into<PathBuf>,
    config: OutputConfig,
) -> Result<GrandOutput, DispatcherError> {
    let output = GrandOutput::new(root_log_path);
    output.apply_configuration(config).await?;
    Ok(output)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sinks::{MemoryStore, MEMORY_KIND};
    use contracts::{BINARY_FILE_KIND, TEXT_FILE_KIND};

    /// Output with the `Memory` kind registered
    pub(crate) fn memory_output(root: &std::path::Path) -> (GrandOutput, MemoryStore) {
        let store = MemoryStore::new();
        let output = GrandOutput::builder()
            .root_log_path(root)
            .register(MEMORY_KIND, store.factory())
            .build();
        (output, store)
    }

    fn memory(name: &str) -> SinkEntry {
        SinkEntry::new(name).with_kind(MEMORY_KIND)
    }

    #[tokio::test]
    async fn test_reconcile_activate_apply_deactivate() {
        let dir = tempfile::tempdir().unwrap();
        let (output, store) = memory_output(dir.path());

        let report = output
            .apply_configuration(OutputConfig::from_entries([memory("a"), memory("b")]).unwrap())
            .await
            .unwrap();
        assert_eq!(report.activated, vec!["a", "b"]);

        let report = output
            .apply_configuration(
                OutputConfig::from_entries([memory("a"), memory("c").with_option("X", 1)])
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(report.unchanged, vec!["a"]);
        assert_eq!(report.activated, vec!["c"]);
        assert_eq!(report.deactivated, vec!["b"]);
        assert_eq!(output.sink_names(), vec!["a", "c"]);

        let report = output
            .apply_configuration(
                OutputConfig::from_entries([memory("a"), memory("c").with_option("X", 2)])
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(report.applied, vec!["c"]);
        output.dispose().await;

        let c = store.texts("c");
        assert!(c.iter().any(|t| t.starts_with("Activating: Memory")));
        assert!(c
            .iter()
            .any(|t| t.starts_with("Applying: Memory {\"X\":1} => Memory {\"X\":2}")));
        // The unchanged sink saw the announcements, but none about itself.
        let a = store.texts("a");
        assert_eq!(a.iter().filter(|t| t.contains("Memory {}")).count(), 2);
    }

    /// Sink owning a resource only one instance may hold at a time
    struct ExclusiveSink {
        name: String,
        resource: Arc<AtomicBool>,
        owned: bool,
        release_delay: std::time::Duration,
        handled: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl LogSink for ExclusiveSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn activate(&mut self) -> Result<(), ContractError> {
            if self.resource.swap(true, Ordering::AcqRel) {
                return Err(ContractError::sink_io(&self.name, "resource busy"));
            }
            self.owned = true;
            Ok(())
        }

        async fn handle(&mut self, line: &LogLine) -> Result<(), ContractError> {
            self.handled.lock().unwrap().push(line.text.clone());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn deactivate(&mut self) -> Result<(), ContractError> {
            if std::mem::take(&mut self.owned) {
                tokio::time::sleep(self.release_delay).await;
                self.resource.store(false, Ordering::Release);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_changed_sink_is_released_before_reactivation() {
        let dir = tempfile::tempdir().unwrap();
        let resource = Arc::new(AtomicBool::new(false));
        let handled = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (r, h) = (Arc::clone(&resource), Arc::clone(&handled));
        let output = GrandOutput::builder()
            .root_log_path(dir.path())
            .register("Exclusive", move |entry: &SinkEntry, _: &OutputContext| {
                Ok(ExclusiveSink {
                    name: entry.name.clone(),
                    resource: Arc::clone(&r),
                    owned: false,
                    release_delay: std::time::Duration::from_millis(50),
                    handled: Arc::clone(&h),
                })
            })
            .build();
        let handler = |port: i64| {
            SinkEntry::new("Handler1")
                .with_kind("Exclusive")
                .with_option("Port", port)
        };

        output
            .apply_configuration(OutputConfig::new().with_entry(handler(1)))
            .await
            .unwrap();
        output.external_log(LogLevel::Info, "before", None);

        let applying = tokio::spawn({
            let output = output.clone();
            async move {
                output
                    .apply_configuration(OutputConfig::new().with_entry(handler(2)))
                    .await
            }
        });
        // Old instance is releasing the resource right now.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        output.external_log(LogLevel::Info, "during", None);
        let report = applying.await.unwrap().unwrap();

        assert_eq!(report.applied, vec!["Handler1"]);
        assert!(report.failed.is_empty());
        assert!(report.deactivated.is_empty());
        assert_eq!(output.sink_names(), vec!["Handler1"]);

        output.external_log(LogLevel::Info, "after", None);
        output.dispose().await;
        assert!(!resource.load(Ordering::Acquire));

        let handled = handled.lock().unwrap();
        let position = |text: &str| handled.iter().position(|t| t == text).unwrap();
        assert!(position("before") < position("during"));
        assert!(position("during") < position("after"));
        assert_eq!(handled.iter().filter(|t| *t == "during").count(), 1);
        assert!(handled
            .iter()
            .any(|t| t.starts_with("Applying: Exclusive {\"Port\":1} => Exclusive {\"Port\":2}")));
    }

    #[tokio::test]
    async fn test_failed_replacement_leaves_name_inactive() {
        let dir = tempfile::tempdir().unwrap();
        let (output, _store) = memory_output(dir.path());

        output
            .apply_configuration(OutputConfig::new().with_entry(memory("m")))
            .await
            .unwrap();
        let report = output
            .apply_configuration(
                OutputConfig::new().with_entry(memory("m").with_option("Reject", true)),
            )
            .await
            .unwrap();

        assert_eq!(report.deactivated, vec!["m"]);
        assert_eq!(report.failed.len(), 1);
        assert!(output.sink_names().is_empty());
        output.dispose().await;
    }

    #[tokio::test]
    async fn test_lines_reach_only_active_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let (output, store) = memory_output(dir.path());

        output
            .apply_configuration(OutputConfig::new().with_entry(memory("first")))
            .await
            .unwrap();
        output.external_log(LogLevel::Info, "one", None);
        output
            .apply_configuration(OutputConfig::new().with_entry(memory("second")))
            .await
            .unwrap();
        output.external_log(LogLevel::Info, "two", None);
        output.dispose().await;

        let first = store.texts("first");
        let second = store.texts("second");
        assert!(first.contains(&"one".to_string()));
        assert!(!first.contains(&"two".to_string()));
        assert!(second.contains(&"two".to_string()));
        assert!(!second.contains(&"one".to_string()));
    }

    #[tokio::test]
    async fn test_failed_activation_is_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let (output, _store) = memory_output(dir.path());

        let config = OutputConfig::from_entries([
            memory("ok"),
            memory("broken").with_option("Reject", true),
            SinkEntry::new("Nope"),
        ])
        .unwrap();
        let report = output.apply_configuration(config).await.unwrap();

        assert_eq!(report.activated, vec!["ok"]);
        let failed: Vec<_> = report.failed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(failed, vec!["Nope", "broken"]);
        assert_eq!(output.sink_names(), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_empty_configuration_is_default_text() {
        let dir = tempfile::tempdir().unwrap();
        let output = GrandOutput::new(dir.path());
        output
            .apply_configuration(OutputConfig::new().with_entry(
                SinkEntry::new("Handler1")
                    .with_kind(BINARY_FILE_KIND)
                    .with_option("Path", "bin"),
            ))
            .await
            .unwrap();

        let report = output.apply_configuration(OutputConfig::new()).await.unwrap();
        assert_eq!(report.activated, vec![TEXT_FILE_KIND]);
        assert_eq!(report.deactivated, vec!["Handler1"]);
        assert_eq!(output.sink_names(), vec![TEXT_FILE_KIND]);
        assert!(dir.path().join("Text").is_dir());
        output.dispose().await;
    }

    #[tokio::test]
    async fn test_critical_errors_gated() {
        let dir = tempfile::tempdir().unwrap();
        let (output, store) = memory_output(dir.path());
        output
            .apply_configuration(OutputConfig::new().with_entry(memory("m")))
            .await
            .unwrap();

        assert!(!output.report_critical_error("dropped", ErrorInfo::new("e1")));
        output.set_handle_critical_errors(true);
        assert!(output.report_critical_error("kept", ErrorInfo::new("e2")));

        let task = output.spawn_background("worker", async {
            Err::<(), _>(anyhow::anyhow!("background boom"))
        });
        task.await.unwrap();
        output.dispose().await;

        let lines = store.lines("m");
        let critical: Vec<_> = lines
            .iter()
            .filter(|l| l.has_tag(CRITICAL_ERROR_TAG))
            .collect();
        assert_eq!(critical.len(), 2);
        assert!(critical.iter().all(|l| l.level == LogLevel::Fatal && l.monitor_id.is_none()));
        assert_eq!(critical[1].error.as_ref().unwrap().message, "background boom");
    }

    #[tokio::test]
    async fn test_external_filter() {
        let dir = tempfile::tempdir().unwrap();
        let output = GrandOutput::builder()
            .root_log_path(dir.path())
            .minimal_filter(LogLevel::Warn)
            .build();
        assert!(!output.is_external_log_enabled(LogLevel::Info));
        assert!(output.is_external_log_enabled(LogLevel::Error));
        assert!(!output.external_log(LogLevel::Info, "filtered", None));

        let mut config = OutputConfig::new().with_entry(SinkEntry::new("Tracing"));
        config.minimal_filter = Some(LogLevel::Debug);
        output.apply_configuration(config).await.unwrap();
        assert!(output.is_external_log_enabled(LogLevel::Debug));
    }

    #[tokio::test]
    async fn test_disposed_rejects_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let output = create_grand_output(dir.path(), OutputConfig::default_text())
            .await
            .unwrap();
        output.dispose().await;
        output.dispose().await;
        assert!(output.is_disposed().await);
        assert!(matches!(
            output.apply_configuration(OutputConfig::new()).await,
            Err(DispatcherError::Disposed)
        ));
        // Never panics, goes nowhere.
        output.external_log(LogLevel::Info, "late", None);
    }

    #[tokio::test]
    async fn test_follow_applies_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let (output, _store) = memory_output(dir.path());
        let (tx, rx) = mpsc::unbounded_channel();
        let task = output.follow(rx);

        tx.send(OutputConfig::new().with_entry(memory("watched"))).unwrap();
        drop(tx);
        task.await.unwrap();
        assert_eq!(output.sink_names(), vec!["watched"]);
    }
}
