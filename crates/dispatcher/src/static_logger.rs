//! Process-wide fallback logger.
//!
//! Used when no monitor can take a line: emissions on a closed monitor, a
//! guard without any monitor. Lines go to the default [`GrandOutput`] when
//! one is active, otherwise they become `tracing` events.
//!
//! [`GrandOutput`]: crate::GrandOutput

use contracts::{ErrorInfo, LogLevel, LogLine, LogTime};

use crate::default;
use crate::sinks::emit_event;

/// Static entry point, never fails, never drops a line silently.
pub struct StaticLogger;

impl StaticLogger {
    /// Routes an already built line.
    pub fn log(line: LogLine) {
        match default::instance() {
            Some(output) => output.dispatch(line),
            None => emit_event("static", &line),
        }
    }

    /// Builds and routes a monitor-less line.
    pub fn send(level: LogLevel, tags: Option<&str>, text: impl Into<String>, error: Option<ErrorInfo>) {
        if level == LogLevel::None {
            return;
        }
        let mut line = LogLine::new(level, LogTime::now(), text);
        if let Some(tags) = tags {
            line = line.with_tags(tags);
        }
        if let Some(error) = error {
            line = line.with_error(error);
        }
        Self::log(line);
    }

    pub fn info(text: impl Into<String>) {
        Self::send(LogLevel::Info, None, text, None);
    }

    pub fn warn(text: impl Into<String>) {
        Self::send(LogLevel::Warn, None, text, None);
    }

    pub fn error(text: impl Into<String>, error: Option<ErrorInfo>) {
        Self::send(LogLevel::Error, None, text, error);
    }

    pub fn fatal(text: impl Into<String>, error: Option<ErrorInfo>) {
        Self::send(LogLevel::Fatal, None, text, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_without_default_instance() {
        StaticLogger::info("to tracing");
        StaticLogger::fatal("", Some(ErrorInfo::new("boom")));
        StaticLogger::send(LogLevel::None, None, "ignored", None);
    }
}
