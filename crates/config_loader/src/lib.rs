//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse JSON/TOML configuration documents
//! - Locate the `<section>.GrandOutput` subtree
//! - Build an `OutputConfig` snapshot, dropping malformed entries with warnings
//! - Watch a configuration source and publish new snapshots
//!
//! # Example
//!
//! ```no_run
//! use config_loader::{ConfigLoader, SectionPath};
//! use std::path::Path;
//!
//! let parsed = ConfigLoader::load_from_path(Path::new("appsettings.json"), &SectionPath::default()).unwrap();
//! println!("sinks: {}", parsed.config.len());
//! ```

mod parser;
mod validator;
mod watcher;

pub use contracts::OutputConfig;
pub use parser::{ConfigFormat, SectionPath};
pub use validator::{ConfigWarning, ParsedConfig};
pub use watcher::{ConfigWatcher, DynamicSource};

use contracts::ContractError;
use std::io::ErrorKind;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load snapshots from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a snapshot from file path
    ///
    /// Automatically detects format from file extension (.json / .toml).
    /// A missing file yields the implicit default snapshot.
    ///
    /// # Errors
    /// - Unsupported format
    /// - File read failure
    /// - Document parse failure
    pub fn load_from_path(path: &Path, section: &SectionPath) -> Result<ParsedConfig, ContractError> {
        let format = Self::detect_format(path)?;
        match Self::read_file(path)? {
            Some(content) => Self::load_from_str(&content, format, section),
            None => Ok(ParsedConfig::implicit_default()),
        }
    }

    /// Load a snapshot from string
    ///
    /// # Errors
    /// - Document parse failure (malformed entries only produce warnings)
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
        section: &SectionPath,
    ) -> Result<ParsedConfig, ContractError> {
        let document = parser::parse_document(content, format)?;
        Ok(Self::from_document(document.as_ref(), section))
    }

    /// Build a snapshot from an already parsed document (`None` = absent)
    pub fn from_document(
        document: Option<&serde_json::Value>,
        section: &SectionPath,
    ) -> ParsedConfig {
        let grand_output = document
            .and_then(|doc| section.resolve(doc))
            .and_then(|s| parser::child_ignore_case(s, "GrandOutput"));
        validator::validate(grand_output)
    }

    /// Serialize a snapshot to JSON string
    pub fn to_json(config: &OutputConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    pub fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content, `None` when the file does not exist
    fn read_file(path: &Path) -> Result<Option<String>, ContractError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
