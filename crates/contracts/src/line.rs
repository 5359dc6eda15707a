//! Log line - the unit routed from monitors to sinks

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{LogLevel, LogTime};

/// Identity of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(Uuid);

impl MonitorId {
    /// Fresh random identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// First 8 hex digits, used by the text format
    pub fn short(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl Default for MonitorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Serializable capture of an error and its causes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    /// Causes (`source()` chain) or aggregated errors
    #[serde(default)]
    pub inner: Vec<ErrorInfo>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            inner: Vec::new(),
        }
    }

    /// Captures `error` and its whole `source()` chain.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        Self {
            message: error.to_string(),
            inner: error
                .source()
                .map(|source| vec![ErrorInfo::from_error(source)])
                .unwrap_or_default(),
        }
    }

    /// Error made of several independent errors.
    pub fn aggregate(message: impl Into<String>, inner: Vec<ErrorInfo>) -> Self {
        Self {
            message: message.into(),
            inner,
        }
    }

    /// Visits this error and all nested ones, depth first, with their depth.
    pub fn walk<'a>(&'a self, depth: usize, visit: &mut impl FnMut(usize, &'a ErrorInfo)) {
        visit(depth, self);
        for inner in &self.inner {
            inner.walk(depth + 1, visit);
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// One structured log line. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// Emitting monitor, `None` for external and critical-error lines
    pub monitor_id: Option<MonitorId>,
    pub time: LogTime,
    pub level: LogLevel,
    pub text: String,
    pub error: Option<ErrorInfo>,
    /// Optional tag / category
    pub tags: Option<String>,
}

impl LogLine {
    pub fn new(level: LogLevel, time: LogTime, text: impl Into<String>) -> Self {
        Self {
            monitor_id: None,
            time,
            level,
            text: text.into(),
            error: None,
            tags: None,
        }
    }

    pub fn with_monitor(mut self, id: MonitorId) -> Self {
        self.monitor_id = Some(id);
        self
    }

    /// Attaches an error. An empty text is replaced by the error message.
    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        if self.text.is_empty() {
            self.text = error.message.clone();
        }
        self.error = Some(error);
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags
            .as_deref()
            .is_some_and(|tags| tags.split('|').any(|t| t.trim() == tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer(#[source] io::Error);

    #[test]
    fn test_error_info_captures_source_chain() {
        let err = Outer(io::Error::new(io::ErrorKind::Other, "disk gone"));
        let info = ErrorInfo::from_error(&err);
        assert_eq!(info.message, "outer failure");
        assert_eq!(info.inner.len(), 1);
        assert_eq!(info.inner[0].message, "disk gone");

        let mut seen = Vec::new();
        info.walk(0, &mut |depth, e| seen.push((depth, e.message.clone())));
        assert_eq!(seen, vec![(0, "outer failure".into()), (1, "disk gone".into())]);
    }

    #[test]
    fn test_with_error_fills_empty_text() {
        let line = LogLine::new(LogLevel::Fatal, LogTime::MIN, "")
            .with_error(ErrorInfo::new("Bug!"));
        assert_eq!(line.text, "Bug!");

        let line = LogLine::new(LogLevel::Fatal, LogTime::MIN, "context")
            .with_error(ErrorInfo::new("Bug!"));
        assert_eq!(line.text, "context");
    }

    #[test]
    fn test_has_tag() {
        let line = LogLine::new(LogLevel::Info, LogTime::MIN, "x").with_tags("MonitorEnd|Request");
        assert!(line.has_tag("MonitorEnd"));
        assert!(line.has_tag("Request"));
        assert!(!line.has_tag("Monitor"));
    }

    #[test]
    fn test_line_survives_bincode() {
        let line = LogLine::new(LogLevel::Warn, LogTime::new(chrono::Utc::now()), "hello")
            .with_monitor(MonitorId::new())
            .with_error(ErrorInfo::aggregate("two", vec![ErrorInfo::new("a"), ErrorInfo::new("b")]));
        let bytes = bincode::serialize(&line).unwrap();
        let back: LogLine = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, line);
    }
}
