//! SinkHandle - owns one live sink through an isolated queue and worker task

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{ContractError, LogLine, LogSink};

use crate::metrics::SinkMetrics;

/// Sending side of a running sink worker.
///
/// The worker stops once every clone of the `Arc<SinkHandle>` is dropped:
/// the dispatcher's transition state and any fan-out still in flight hold
/// one, so lines already routed to this sink are persisted before
/// `deactivate` runs.
pub struct SinkHandle {
    /// Sink name (configuration key)
    name: String,
    /// Resolved kind
    kind: String,
    /// Channel to send lines to worker
    tx: mpsc::UnboundedSender<Arc<LogLine>>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
}

/// Receiving side of a [`SinkHandle`] whose sink is not started yet.
///
/// Lines sent to the handle wait in the queue until [`start`](Self::start)
/// activates the sink; none reaches it before.
pub struct PendingSink {
    name: String,
    rx: mpsc::UnboundedReceiver<Arc<LogLine>>,
    metrics: Arc<SinkMetrics>,
}

impl SinkHandle {
    /// Handle with an open queue and no sink behind it yet.
    pub fn pending(name: impl Into<String>, kind: impl Into<String>) -> (Self, PendingSink) {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(SinkMetrics::new());
        let pending = PendingSink {
            name: name.clone(),
            rx,
            metrics: Arc::clone(&metrics),
        };
        (
            Self {
                name,
                kind: kind.into(),
                tx,
                metrics,
            },
            pending,
        )
    }

    /// Activate `sink` then spawn its worker.
    pub async fn activate<S: LogSink + 'static>(
        sink: S,
        kind: impl Into<String>,
    ) -> Result<(Self, JoinHandle<()>), ContractError> {
        let (handle, pending) = Self::pending(sink.name(), kind);
        let worker = pending.start(sink).await?;
        Ok((handle, worker))
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a line for the sink (non-blocking).
    ///
    /// Returns false when the sink is faulted or its worker is gone.
    pub fn send(&self, line: Arc<LogLine>) -> bool {
        if self.metrics.is_faulted() {
            self.metrics.record_dropped();
            return false;
        }
        match self.tx.send(line) {
            Ok(()) => true,
            Err(_) => {
                self.metrics.record_dropped();
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }
}

impl PendingSink {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Activates `sink`, then spawns the worker draining the queue.
    ///
    /// On activation failure the sink is deactivated (releasing whatever
    /// was partially acquired), the handle is marked faulted and the lines
    /// already queued are counted as dropped.
    #[instrument(name = "sink_handle_activate", skip(self, sink), fields(sink = %self.name))]
    pub async fn start<S: LogSink + 'static>(
        self,
        mut sink: S,
    ) -> Result<JoinHandle<()>, ContractError> {
        if let Err(e) = sink.activate().await {
            if let Err(release) = sink.deactivate().await {
                warn!(error = %release, "Release after failed activation failed");
            }
            self.discard();
            return Err(e);
        }

        let Self { name, rx, metrics } = self;
        Ok(tokio::spawn(async move {
            sink_worker(sink, rx, metrics, name).await;
        }))
    }

    fn discard(mut self) {
        self.metrics.mark_faulted();
        self.rx.close();
        while self.rx.try_recv().is_ok() {
            self.metrics.record_dropped();
        }
        self.metrics.observe_queue(0);
    }
}

/// Worker task that consumes lines and hands them to the sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: LogSink>(
    mut sink: S,
    mut rx: mpsc::UnboundedReceiver<Arc<LogLine>>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!("Sink worker started");

    while let Some(line) = rx.recv().await {
        metrics.observe_queue(rx.len());

        match sink.handle(&line).await {
            Ok(()) => metrics.record_written(),
            Err(e) => {
                metrics.record_failure();
                error!(error = %e, "Sink failed, removing it until next reconfiguration");
                if let Err(e) = sink.deactivate().await {
                    error!(error = %e, "Deactivate failed after sink error");
                }
                // Nothing else reaches the sink; account for what is left.
                while rx.recv().await.is_some() {
                    metrics.record_dropped();
                }
                metrics.observe_queue(0);
                debug!("Faulted sink worker stopped");
                return;
            }
        }

        if rx.is_empty() {
            match sink.flush().await {
                Ok(()) => metrics.record_flush(),
                Err(e) => error!(error = %e, "Flush failed"),
            }
        }
    }

    if let Err(e) = sink.deactivate().await {
        error!(error = %e, "Deactivate failed on shutdown");
    }

    debug!("Sink worker stopped");
}
