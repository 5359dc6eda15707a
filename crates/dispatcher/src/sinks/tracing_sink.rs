//! TracingSink - re-emits lines as tracing events (debugging aid)

use contracts::{ContractError, LogLevel, LogLine, LogSink};
use tracing::{debug, error, info, instrument, trace, warn};

/// Kind key of the tracing sink
pub const TRACING_KIND: &str = "Tracing";

/// Sink forwarding every line to the process `tracing` subscriber
pub struct TracingSink {
    name: String,
}

impl TracingSink {
    /// Create a new TracingSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Emits `line` as a tracing event at the matching level.
pub(crate) fn emit_event(target_sink: &str, line: &LogLine) {
    let monitor = line.monitor_id.map(|id| id.short());
    let tags = line.tags.as_deref().unwrap_or("");
    let error = line.error.as_ref().map(|e| e.message.as_str());
    match line.level {
        LogLevel::Debug => {
            debug!(sink = target_sink, monitor = ?monitor, tags, error = ?error, "{}", line.text)
        }
        LogLevel::Trace => {
            trace!(sink = target_sink, monitor = ?monitor, tags, error = ?error, "{}", line.text)
        }
        LogLevel::Info => {
            info!(sink = target_sink, monitor = ?monitor, tags, error = ?error, "{}", line.text)
        }
        LogLevel::Warn => {
            warn!(sink = target_sink, monitor = ?monitor, tags, error = ?error, "{}", line.text)
        }
        LogLevel::Error | LogLevel::Fatal => {
            error!(sink = target_sink, monitor = ?monitor, tags, error = ?error, level = %line.level, "{}", line.text)
        }
        LogLevel::None => {}
    }
}

impl LogSink for TracingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn activate(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn handle(&mut self, line: &LogLine) -> Result<(), ContractError> {
        emit_event(&self.name, line);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for tracing sink
        Ok(())
    }

    #[instrument(name = "tracing_sink_deactivate", skip(self))]
    async fn deactivate(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "TracingSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::LogTime;

    #[tokio::test]
    async fn test_tracing_sink_handle() {
        let mut sink = TracingSink::new("trace_out");
        assert_eq!(sink.name(), "trace_out");
        sink.activate().await.unwrap();
        for level in LogLevel::ALL {
            let line = LogLine::new(level, LogTime::now(), "line");
            assert!(sink.handle(&line).await.is_ok());
        }
        sink.deactivate().await.unwrap();
    }
}
