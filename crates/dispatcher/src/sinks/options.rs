//! Typed sink options read out of a configuration entry

use contracts::{ContractError, SinkEntry};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;
use validator::Validate;

/// Options of a built-in sink kind.
pub trait SinkOptions: DeserializeOwned + Validate {
    /// Canonical (PascalCase) keys
    const KEYS: &'static [&'static str];
}

/// Reads and validates typed options out of an entry.
///
/// Keys match ignoring ASCII case, like section and kind names. Unknown
/// keys are ignored with a warning.
pub(crate) fn parse_options<T: SinkOptions>(entry: &SinkEntry) -> Result<T, ContractError> {
    let mut normalized = Map::new();
    for (key, value) in &entry.options {
        match T::KEYS.iter().find(|k| k.eq_ignore_ascii_case(key)) {
            Some(canonical) => {
                normalized.insert((*canonical).to_string(), value.clone());
            }
            None => warn!(sink = %entry.name, key = %key, "Unknown sink option ignored"),
        }
    }

    let options: T = serde_json::from_value(Value::Object(normalized)).map_err(|e| {
        ContractError::config_validation(&entry.name, format!("invalid options: {e}"))
    })?;
    options
        .validate()
        .map_err(|e| ContractError::config_validation(&entry.name, e.to_string()))?;
    Ok(options)
}
