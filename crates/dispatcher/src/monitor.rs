//! Monitor - per unit of work log emitter

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use contracts::{ErrorInfo, LogLevel, LogLine, LogTime, MonitorId};

use crate::grand_output::GrandOutput;
use crate::static_logger::StaticLogger;

/// Tag of the closing line of a monitor
pub const MONITOR_END_TAG: &str = "MonitorEnd";

/// Text of the closing line when no reason is given
pub const DEFAULT_CLOSE_REASON: &str = "Done.";

struct MonitorState {
    output: Option<GrandOutput>,
    closed: bool,
    minimal_filter: LogLevel,
    last_time: LogTime,
}

struct MonitorInner {
    id: MonitorId,
    created_at: LogTime,
    state: Mutex<MonitorState>,
}

/// Log emitter bound to one unit of work.
///
/// Lines carry the monitor identity and a strictly increasing [`LogTime`].
/// They are dispatched while the monitor lock is held, so one sink always
/// receives them in emission order. After [`close`](Monitor::close) lines go
/// to the [`StaticLogger`] instead of being dropped.
///
/// Clones are handles on the same monitor.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    /// Unattached monitor; its lines go to the static logger until a
    /// [`GrandOutput`] adopts it.
    pub fn new() -> Self {
        let created_at = LogTime::now();
        Self {
            inner: Arc::new(MonitorInner {
                id: MonitorId::new(),
                created_at,
                state: Mutex::new(MonitorState {
                    output: None,
                    closed: false,
                    minimal_filter: LogLevel::Debug,
                    last_time: created_at,
                }),
            }),
        }
    }

    pub fn id(&self) -> MonitorId {
        self.inner.id
    }

    pub fn created_at(&self) -> LogTime {
        self.inner.created_at
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Time of the last emitted line (creation time before any)
    pub fn last_log_time(&self) -> LogTime {
        self.state().last_time
    }

    pub fn minimal_filter(&self) -> LogLevel {
        self.state().minimal_filter
    }

    pub fn set_minimal_filter(&self, level: LogLevel) {
        self.state().minimal_filter = level;
    }

    /// Output receiving the lines, if any
    pub fn output(&self) -> Option<GrandOutput> {
        self.state().output.clone()
    }

    /// Routes the lines to `output`, replacing any previous one.
    ///
    /// Returns false when already attached to it, or closed.
    pub(crate) fn attach(&self, output: GrandOutput) -> bool {
        let mut state = self.state();
        if state.closed {
            return false;
        }
        if state.output.as_ref().is_some_and(|o| o.ptr_eq(&output)) {
            return false;
        }
        state.output = Some(output);
        true
    }

    /// Emits a line when `level` passes the minimal filter.
    pub fn emit(&self, level: LogLevel, text: impl Into<String>) -> bool {
        self.log(level, None, text.into(), None, true)
    }

    /// Emits a line carrying `error`. An empty text takes the error message.
    pub fn emit_error(&self, level: LogLevel, text: impl Into<String>, error: ErrorInfo) -> bool {
        self.log(level, None, text.into(), Some(error), true)
    }

    /// Emits regardless of the minimal filter (a `None` level still emits
    /// nothing).
    pub fn unfiltered_log(
        &self,
        level: LogLevel,
        tags: Option<&str>,
        text: impl Into<String>,
        error: Option<ErrorInfo>,
    ) -> bool {
        self.log(level, tags, text.into(), error, false)
    }

    pub fn debug(&self, text: impl Into<String>) -> bool {
        self.emit(LogLevel::Debug, text)
    }

    pub fn trace(&self, text: impl Into<String>) -> bool {
        self.emit(LogLevel::Trace, text)
    }

    pub fn info(&self, text: impl Into<String>) -> bool {
        self.emit(LogLevel::Info, text)
    }

    pub fn warn(&self, text: impl Into<String>) -> bool {
        self.emit(LogLevel::Warn, text)
    }

    pub fn error(&self, text: impl Into<String>) -> bool {
        self.emit(LogLevel::Error, text)
    }

    pub fn fatal(&self, text: impl Into<String>) -> bool {
        self.emit(LogLevel::Fatal, text)
    }

    /// Scope entry, informational only: a Trace line.
    pub fn begin_scope(&self, text: impl Into<String>) -> bool {
        self.emit(LogLevel::Trace, text)
    }

    /// Closes the monitor with one `MonitorEnd` line.
    ///
    /// Returns false when it was already closed.
    pub fn close(&self, reason: Option<&str>) -> bool {
        let mut state = self.state();
        if state.closed {
            return false;
        }
        let line = self.line(
            &mut state,
            LogLevel::Info,
            Some(MONITOR_END_TAG),
            reason.unwrap_or(DEFAULT_CLOSE_REASON).to_string(),
            None,
        );
        Self::deliver(&state, line);
        state.closed = true;
        state.output = None;
        true
    }

    fn log(
        &self,
        level: LogLevel,
        tags: Option<&str>,
        text: String,
        error: Option<ErrorInfo>,
        filtered: bool,
    ) -> bool {
        if level == LogLevel::None {
            return false;
        }
        let mut state = self.state();
        if filtered && !level.passes(state.minimal_filter) {
            return false;
        }
        let line = self.line(&mut state, level, tags, text, error);
        if state.closed {
            drop(state);
            StaticLogger::log(line);
        } else {
            Self::deliver(&state, line);
        }
        true
    }

    fn line(
        &self,
        state: &mut MonitorState,
        level: LogLevel,
        tags: Option<&str>,
        text: String,
        error: Option<ErrorInfo>,
    ) -> LogLine {
        let time = state.last_time.next_after(Utc::now());
        state.last_time = time;
        let mut line = LogLine::new(level, time, text).with_monitor(self.inner.id);
        if let Some(tags) = tags {
            line = line.with_tags(tags);
        }
        if let Some(error) = error {
            line = line.with_error(error);
        }
        line
    }

    fn deliver(state: &MonitorState, line: LogLine) {
        match &state.output {
            Some(output) => output.dispatch(line),
            None => StaticLogger::log(line),
        }
    }

    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
