//! OutputConfig - Config Loader output, Dispatcher input
//!
//! Immutable description of the sinks that should be running.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::{ContractError, LogLevel};

/// Kind key of the built-in text file sink
pub const TEXT_FILE_KIND: &str = "TextFile";

/// Kind key of the built-in binary file sink
pub const BINARY_FILE_KIND: &str = "BinaryFile";

/// Sub folder of the implicit default text sink
pub const DEFAULT_TEXT_PATH: &str = "Text";

/// Option key carrying the declared kind of an entry
pub const CONFIGURATION_TYPE_KEY: &str = "ConfigurationType";

/// One sink of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkEntry {
    /// Unique key within a snapshot
    pub name: String,

    /// `ConfigurationType`, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_kind: Option<String>,

    /// Kind-specific options, `ConfigurationType` excluded
    pub options: Map<String, Value>,
}

impl SinkEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_kind: None,
            options: Map::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.declared_kind = Some(kind.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Kinds to try, in order: the declared one then the entry name.
    pub fn kind_candidates(&self) -> impl Iterator<Item = &str> {
        self.declared_kind
            .as_deref()
            .into_iter()
            .chain(std::iter::once(self.name.as_str()))
    }

    /// Options as a JSON object
    pub fn options_value(&self) -> Value {
        Value::Object(self.options.clone())
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

impl fmt::Display for SinkEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.declared_kind.as_deref().unwrap_or(&self.name);
        write!(f, "{kind} {}", Value::Object(self.options.clone()))
    }
}

/// Configuration snapshot: what should be running now
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct OutputConfig {
    /// Sinks by name
    pub handlers: BTreeMap<String, SinkEntry>,

    /// Enables/disables the critical error channel when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_critical_errors: Option<bool>,

    /// Filter applied to external lines when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimal_filter: Option<LogLevel>,
}

impl OutputConfig {
    /// Empty snapshot (no sink at all)
    pub fn new() -> Self {
        Self::default()
    }

    /// The implicit default: a single text file sink under `Text`.
    pub fn default_text() -> Self {
        let mut config = Self::new();
        config.handlers.insert(
            TEXT_FILE_KIND.to_string(),
            SinkEntry::new(TEXT_FILE_KIND).with_option("Path", DEFAULT_TEXT_PATH),
        );
        config
    }

    /// Builds a snapshot, rejecting duplicate names.
    pub fn from_entries(
        entries: impl IntoIterator<Item = SinkEntry>,
    ) -> Result<Self, ContractError> {
        let mut config = Self::new();
        for entry in entries {
            config.add(entry)?;
        }
        Ok(config)
    }

    /// Adds an entry.
    ///
    /// # Errors
    /// `DuplicateSink` when the name is already present
    pub fn add(&mut self, entry: SinkEntry) -> Result<(), ContractError> {
        if self.handlers.contains_key(&entry.name) {
            return Err(ContractError::DuplicateSink { name: entry.name });
        }
        self.handlers.insert(entry.name.clone(), entry);
        Ok(())
    }

    pub fn with_entry(mut self, entry: SinkEntry) -> Self {
        self.handlers.insert(entry.name.clone(), entry);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SinkEntry> {
        self.handlers.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &SinkEntry> {
        self.handlers.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_text_snapshot() {
        let config = OutputConfig::default_text();
        assert_eq!(config.len(), 1);
        let entry = config.get(TEXT_FILE_KIND).unwrap();
        assert_eq!(entry.option_str("Path"), Some(DEFAULT_TEXT_PATH));
        assert!(entry.declared_kind.is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = OutputConfig::from_entries([SinkEntry::new("a"), SinkEntry::new("a")]);
        assert!(matches!(result, Err(ContractError::DuplicateSink { .. })));
    }

    #[test]
    fn test_kind_candidates_fall_back_to_name() {
        let entry = SinkEntry::new("TextFile").with_kind("NotAKind");
        let kinds: Vec<_> = entry.kind_candidates().collect();
        assert_eq!(kinds, vec!["NotAKind", "TextFile"]);

        let entry = SinkEntry::new("Handler1");
        assert_eq!(entry.kind_candidates().collect::<Vec<_>>(), vec!["Handler1"]);
    }

    #[test]
    fn test_entry_display() {
        let entry = SinkEntry::new("H").with_kind("Custom").with_option("Message", "Hello 1");
        assert_eq!(entry.to_string(), r#"Custom {"Message":"Hello 1"}"#);
    }
}
