//! 配置校验模块
//!
//! 校验规则 (逐条宽松处理)：
//! - handler 值必须是对象
//! - handler 名称非空
//! - `ConfigurationType` 若存在必须是字符串
//! - `HandleCriticalErrors` 必须是布尔值
//! - `MinimalFilter` 必须是合法日志级别
//!
//! 不合法的条目被丢弃并产生 `ConfigWarning`，其余条目照常生效。

use contracts::{LogLevel, OutputConfig, SinkEntry, CONFIGURATION_TYPE_KEY};
use serde_json::Value;
use thiserror::Error;

use crate::parser::child_ignore_case;

/// A configuration problem that did not abort the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct ConfigWarning {
    pub path: String,
    pub message: String,
}

impl ConfigWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Snapshot plus the warnings collected while building it
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedConfig {
    pub config: OutputConfig,
    pub warnings: Vec<ConfigWarning>,
    /// True when the implicit default handler set was used
    pub is_default: bool,
}

impl ParsedConfig {
    /// The implicit default snapshot
    pub fn implicit_default() -> Self {
        Self {
            config: OutputConfig::default_text(),
            warnings: Vec::new(),
            is_default: true,
        }
    }
}

/// 校验 GrandOutput 子树并构造快照
///
/// `grand_output` 为 `None` (子树缺失) 时返回默认快照。
pub fn validate(grand_output: Option<&Value>) -> ParsedConfig {
    let Some(grand_output) = grand_output else {
        return ParsedConfig::implicit_default();
    };
    let Some(object) = grand_output.as_object() else {
        return ParsedConfig {
            warnings: vec![ConfigWarning::new(
                "GrandOutput",
                "expected an object, using the default configuration",
            )],
            ..ParsedConfig::implicit_default()
        };
    };

    let mut warnings = Vec::new();
    let mut config = OutputConfig::new();

    if let Some(handlers) = child_ignore_case(grand_output, "Handlers") {
        match handlers.as_object() {
            Some(handlers) => {
                for (name, value) in handlers {
                    match validate_entry(name, value) {
                        Ok(entry) => {
                            if let Err(e) = config.add(entry) {
                                warnings.push(ConfigWarning::new(
                                    format!("Handlers.{name}"),
                                    e.to_string(),
                                ));
                            }
                        }
                        Err(warning) => warnings.push(warning),
                    }
                }
            }
            None => warnings.push(ConfigWarning::new("Handlers", "expected an object")),
        }
    }

    config.handle_critical_errors = validate_critical_errors(grand_output, &mut warnings);
    config.minimal_filter = validate_minimal_filter(grand_output, &mut warnings);

    // 没有任何可用 handler 时回退到默认的 Text 文件输出
    let is_default = config.is_empty();
    if is_default {
        config.handlers = OutputConfig::default_text().handlers;
    }

    tracing::trace!(keys = object.len(), handlers = config.len(), "GrandOutput section validated");

    ParsedConfig {
        config,
        warnings,
        is_default,
    }
}

/// 校验单个 handler 条目
fn validate_entry(name: &str, value: &Value) -> Result<SinkEntry, ConfigWarning> {
    let path = format!("Handlers.{name}");
    if name.trim().is_empty() {
        return Err(ConfigWarning::new(path, "handler name cannot be empty"));
    }
    let Some(object) = value.as_object() else {
        return Err(ConfigWarning::new(
            path,
            format!("expected an object, found {}", json_kind(value)),
        ));
    };

    let mut entry = SinkEntry::new(name);
    for (key, option) in object {
        if key.eq_ignore_ascii_case(CONFIGURATION_TYPE_KEY) {
            match option {
                Value::String(kind) if !kind.trim().is_empty() => {
                    entry.declared_kind = Some(kind.trim().to_string());
                }
                Value::String(_) | Value::Null => {}
                other => {
                    return Err(ConfigWarning::new(
                        format!("{path}.{CONFIGURATION_TYPE_KEY}"),
                        format!("expected a string, found {}", json_kind(other)),
                    ));
                }
            }
        } else {
            entry.options.insert(key.clone(), option.clone());
        }
    }
    Ok(entry)
}

fn validate_critical_errors(
    grand_output: &Value,
    warnings: &mut Vec<ConfigWarning>,
) -> Option<bool> {
    match child_ignore_case(grand_output, "HandleCriticalErrors")? {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        other => {
            warnings.push(ConfigWarning::new(
                "HandleCriticalErrors",
                format!("expected a boolean, found {}", json_kind(other)),
            ));
            None
        }
    }
}

fn validate_minimal_filter(
    grand_output: &Value,
    warnings: &mut Vec<ConfigWarning>,
) -> Option<LogLevel> {
    let value = child_ignore_case(grand_output, "MinimalFilter")?;
    match value.as_str().map(str::parse::<LogLevel>) {
        Some(Ok(level)) => Some(level),
        Some(Err(e)) => {
            warnings.push(ConfigWarning::new("MinimalFilter", e.to_string()));
            None
        }
        None => {
            warnings.push(ConfigWarning::new(
                "MinimalFilter",
                format!("expected a level name, found {}", json_kind(value)),
            ));
            None
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TEXT_FILE_KIND;
    use serde_json::json;

    #[test]
    fn test_missing_section_is_default() {
        let parsed = validate(None);
        assert!(parsed.is_default);
        assert!(parsed.config.get(TEXT_FILE_KIND).is_some());
    }

    #[test]
    fn test_empty_grand_output_is_default() {
        let parsed = validate(Some(&json!({})));
        assert!(parsed.is_default);
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_malformed_entry_is_dropped_others_apply() {
        let section = json!({
            "Handlers": {
                "Broken": 42,
                "BadType": { "ConfigurationType": 12 },
                "TextFile": { "Path": "kept" }
            }
        });
        let parsed = validate(Some(&section));
        assert!(!parsed.is_default);
        assert_eq!(parsed.config.len(), 1);
        assert_eq!(
            parsed.config.get("TextFile").unwrap().option_str("Path"),
            Some("kept")
        );
        assert_eq!(parsed.warnings.len(), 2);
        assert!(parsed.warnings.iter().any(|w| w.path == "Handlers.Broken"));
    }

    #[test]
    fn test_configuration_type_is_extracted() {
        let section = json!({
            "Handlers": {
                "Handler1": { "ConfigurationType": "BinaryFile", "Path": "bin" }
            }
        });
        let parsed = validate(Some(&section));
        let entry = parsed.config.get("Handler1").unwrap();
        assert_eq!(entry.declared_kind.as_deref(), Some("BinaryFile"));
        assert!(!entry.options.contains_key(CONFIGURATION_TYPE_KEY));
    }

    #[test]
    fn test_global_options() {
        let section = json!({
            "HandleCriticalErrors": "true",
            "MinimalFilter": "Warn",
            "Handlers": { "TextFile": {} }
        });
        let parsed = validate(Some(&section));
        assert_eq!(parsed.config.handle_critical_errors, Some(true));
        assert_eq!(parsed.config.minimal_filter, Some(LogLevel::Warn));

        let parsed = validate(Some(&json!({ "MinimalFilter": 3 })));
        assert_eq!(parsed.config.minimal_filter, None);
        assert_eq!(parsed.warnings.len(), 1);
    }
}
