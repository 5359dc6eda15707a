//! MemorySink - keeps lines in memory, for hosts that inspect what was logged

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use contracts::{ContractError, LogLine, LogSink, SinkEntry};

use crate::registry::OutputContext;

/// Kind under which [`MemoryStore::factory`] is usually registered
pub const MEMORY_KIND: &str = "Memory";

type Lines = Arc<Mutex<Vec<LogLine>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Lines received by memory sinks, by sink name.
///
/// Successive instances of one name (after a reconfiguration) append to the
/// same list.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sinks: Arc<Mutex<BTreeMap<String, Lines>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink appending to the list of `name`
    pub fn sink(&self, name: &str) -> MemorySink {
        let lines = Arc::clone(lock(&self.sinks).entry(name.to_string()).or_default());
        MemorySink {
            name: name.to_string(),
            lines,
        }
    }

    /// Factory to register; an entry with `"Reject": true` is refused.
    pub fn factory(
        &self,
    ) -> impl Fn(&SinkEntry, &OutputContext) -> Result<MemorySink, ContractError> + Send + Sync + 'static
    {
        let store = self.clone();
        move |entry: &SinkEntry, _context: &OutputContext| {
            if entry.options.get("Reject").and_then(|v| v.as_bool()) == Some(true) {
                return Err(ContractError::config_validation(&entry.name, "sink rejected"));
            }
            Ok(store.sink(&entry.name))
        }
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.sinks).keys().cloned().collect()
    }

    pub fn lines(&self, name: &str) -> Vec<LogLine> {
        let lines = lock(&self.sinks).get(name).cloned();
        lines
            .map(|l| {
                let guard = lock(&l);
                guard.clone()
            })
            .unwrap_or_default()
    }

    pub fn texts(&self, name: &str) -> Vec<String> {
        self.lines(name).into_iter().map(|l| l.text).collect()
    }
}

/// Sink appending lines to a [`MemoryStore`] list
pub struct MemorySink {
    name: String,
    lines: Lines,
}

impl LogSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn activate(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn handle(&mut self, line: &LogLine) -> Result<(), ContractError> {
        lock(&self.lines).push(line.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn deactivate(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{LogLevel, LogTime};

    #[tokio::test]
    async fn test_instances_share_the_list() {
        let store = MemoryStore::new();
        let mut first = store.sink("m");
        first
            .handle(&LogLine::new(LogLevel::Info, LogTime::now(), "a"))
            .await
            .unwrap();
        let mut second = store.sink("m");
        second
            .handle(&LogLine::new(LogLevel::Info, LogTime::now(), "b"))
            .await
            .unwrap();

        assert_eq!(store.texts("m"), vec!["a", "b"]);
        assert!(store.texts("other").is_empty());
    }

    #[test]
    fn test_factory_rejects() {
        let store = MemoryStore::new();
        let factory = store.factory();
        let context = OutputContext::new("/tmp");
        assert!(factory(&SinkEntry::new("ok"), &context).is_ok());
        assert!(factory(&SinkEntry::new("no").with_option("Reject", true), &context).is_err());
        assert_eq!(store.names(), vec!["ok"]);
    }
}
