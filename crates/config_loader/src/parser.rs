//! 配置解析模块
//!
//! 支持 JSON (主要) 和 TOML 格式，统一解析为 `serde_json::Value` 树，
//! 再按 section 路径定位 GrandOutput 子树。

use contracts::ContractError;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    /// JSON 格式 (推荐)
    #[default]
    Json,
    /// TOML 格式
    Toml,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Colon separated path of the monitoring section, e.g. `Monitoring` or
/// `App:Monitoring`. Keys are matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionPath(Vec<String>);

impl SectionPath {
    /// Default section key
    pub const DEFAULT: &'static str = "Monitoring";

    pub fn new(path: &str) -> Self {
        Self(
            path.split(':')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Resolves the section inside `root`; `None` when any segment is missing.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(root, |node, key| child_ignore_case(node, key))
    }
}

impl Default for SectionPath {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

impl FromStr for SectionPath {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = Self::new(s);
        if path.0.is_empty() {
            return Err(ContractError::config_validation(
                "section",
                "section path cannot be empty",
            ));
        }
        Ok(path)
    }
}

impl fmt::Display for SectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(":"))
    }
}

/// Case-insensitive object member lookup.
pub(crate) fn child_ignore_case<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    let object = node.as_object()?;
    object.get(key).or_else(|| {
        object
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// 解析 JSON 文档
pub fn parse_json(content: &str) -> Result<Value, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 TOML 文档
pub fn parse_toml(content: &str) -> Result<Value, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析文档。空白内容视为没有配置 (`None`)。
pub fn parse_document(content: &str, format: ConfigFormat) -> Result<Option<Value>, ContractError> {
    if content.trim().is_empty() {
        return Ok(None);
    }
    let value = match format {
        ConfigFormat::Json => parse_json(content)?,
        ConfigFormat::Toml => parse_toml(content)?,
    };
    Ok(Some(value))
}
