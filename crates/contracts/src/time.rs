//! Logical log time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// Wall-clock timestamp plus a uniquifier.
///
/// Two times produced by the same [`LogClock`] are always strictly ordered,
/// even when the system clock does not move (or moves backwards) between
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogTime {
    pub timestamp: DateTime<Utc>,
    pub uniquifier: u8,
}

impl LogTime {
    /// Smallest possible time.
    pub const MIN: LogTime = LogTime {
        timestamp: DateTime::<Utc>::MIN_UTC,
        uniquifier: 0,
    };

    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            uniquifier: 0,
        }
    }

    /// Current wall clock, uniquifier 0
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// First time strictly after `self`, given the current wall clock.
    pub fn next_after(&self, now: DateTime<Utc>) -> LogTime {
        if now > self.timestamp {
            return LogTime::new(now);
        }
        if self.uniquifier < u8::MAX {
            return LogTime {
                timestamp: self.timestamp,
                uniquifier: self.uniquifier + 1,
            };
        }
        LogTime::new(self.timestamp + Duration::microseconds(1))
    }
}

impl fmt::Display for LogTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"))?;
        if self.uniquifier > 0 {
            write!(f, "({})", self.uniquifier)?;
        }
        Ok(())
    }
}

/// Source of strictly increasing [`LogTime`]s.
#[derive(Debug)]
pub struct LogClock {
    last: Mutex<LogTime>,
}

impl LogClock {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(LogTime::MIN),
        }
    }

    /// Next time, strictly greater than every time returned before.
    pub fn next(&self) -> LogTime {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = last.next_after(Utc::now());
        *last = next;
        next
    }

    /// Last time handed out.
    pub fn last(&self) -> LogTime {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for LogClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_after_same_timestamp_bumps_uniquifier() {
        let t = LogTime::new(Utc::now());
        let next = t.next_after(t.timestamp);
        assert_eq!(next.timestamp, t.timestamp);
        assert_eq!(next.uniquifier, 1);
        assert!(next > t);
    }

    #[test]
    fn test_next_after_clock_going_backwards() {
        let t = LogTime::new(Utc::now());
        let next = t.next_after(t.timestamp - Duration::seconds(5));
        assert!(next > t);
    }

    #[test]
    fn test_uniquifier_overflow_moves_timestamp() {
        let t = LogTime {
            timestamp: Utc::now(),
            uniquifier: u8::MAX,
        };
        let next = t.next_after(t.timestamp);
        assert_eq!(next.uniquifier, 0);
        assert!(next.timestamp > t.timestamp);
    }

    #[test]
    fn test_clock_is_strictly_increasing() {
        let clock = LogClock::new();
        let mut previous = clock.next();
        for _ in 0..1000 {
            let t = clock.next();
            assert!(t > previous);
            previous = t;
        }
        assert_eq!(clock.last(), previous);
    }
}
