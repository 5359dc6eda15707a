//! Log levels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ContractError;

/// Severity of a log line.
///
/// Ordered `Debug < Trace < Info < Warn < Error < Fatal`. `None` sorts last
/// and is a sentinel: a line at `None` is never emitted and a filter set to
/// `None` lets nothing through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Trace,
    Info,
    Warn,
    Error,
    Fatal,
    None,
}

impl LogLevel {
    /// All emitting levels, lowest first.
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Debug,
        LogLevel::Trace,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    /// Whether a line at this level passes `filter`.
    pub fn passes(self, filter: LogLevel) -> bool {
        self != LogLevel::None && filter != LogLevel::None && self >= filter
    }

    /// Single-character tag used by the text format.
    pub fn as_char(self) -> char {
        match self {
            LogLevel::Debug => 'd',
            LogLevel::Trace => ' ',
            LogLevel::Info => 'i',
            LogLevel::Warn => 'W',
            LogLevel::Error => 'E',
            LogLevel::Fatal => 'F',
            LogLevel::None => '?',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "Debug",
            LogLevel::Trace => "Trace",
            LogLevel::Info => "Info",
            LogLevel::Warn => "Warn",
            LogLevel::Error => "Error",
            LogLevel::Fatal => "Fatal",
            LogLevel::None => "None",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            "none" | "off" => Ok(LogLevel::None),
            other => Err(ContractError::config_validation(
                "level",
                format!("unknown log level '{other}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Trace);
        assert!(LogLevel::Trace < LogLevel::Info);
        assert!(LogLevel::Error < LogLevel::Fatal);
        assert!(LogLevel::Fatal < LogLevel::None);
    }

    #[test]
    fn test_none_never_passes() {
        assert!(!LogLevel::None.passes(LogLevel::Debug));
        for level in LogLevel::ALL {
            assert!(!level.passes(LogLevel::None));
        }
        assert!(LogLevel::Warn.passes(LogLevel::Info));
        assert!(!LogLevel::Trace.passes(LogLevel::Info));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" fatal ".parse::<LogLevel>().unwrap(), LogLevel::Fatal);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
