//! Per-sink counters, shared between the fan-out side and the sink worker

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Counters of one live sink instance.
///
/// A replaced sink gets fresh counters; nothing carries over between
/// instances of the same name.
#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_depth: AtomicUsize,
    lines_written: AtomicU64,
    lines_dropped: AtomicU64,
    flushes: AtomicU64,
    handle_failures: AtomicU64,
    /// Set on the first `handle` failure; fan-out skips the sink afterwards
    faulted: AtomicBool,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines queued but not yet handled, as last seen by the worker
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    pub(crate) fn observe_queue(&self, depth: usize) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written.load(Ordering::Relaxed)
    }

    pub(crate) fn record_written(&self) {
        self.lines_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Lines routed to the sink that it never handled
    pub fn lines_dropped(&self) -> u64 {
        self.lines_dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn record_dropped(&self) {
        self.lines_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    pub(crate) fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handle_failures(&self) -> u64 {
        self.handle_failures.load(Ordering::Relaxed)
    }

    /// Records a failed `handle`; the sink is faulted from now on.
    pub(crate) fn record_failure(&self) {
        self.handle_failures.fetch_add(1, Ordering::Relaxed);
        self.faulted.store(true, Ordering::Release);
    }

    pub(crate) fn mark_faulted(&self) {
        self.faulted.store(true, Ordering::Release);
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_depth: self.queue_depth(),
            lines_written: self.lines_written(),
            lines_dropped: self.lines_dropped(),
            flushes: self.flushes(),
            handle_failures: self.handle_failures(),
            faulted: self.is_faulted(),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_depth: usize,
    pub lines_written: u64,
    pub lines_dropped: u64,
    pub flushes: u64,
    pub handle_failures: u64,
    pub faulted: bool,
}
