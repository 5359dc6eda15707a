//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, ParsedConfig, SectionPath};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::CliError;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    is_default: bool,
    handle_critical_errors: Option<bool>,
    minimal_filter: Option<String>,
    handlers: Vec<HandlerSummary>,
}

#[derive(Serialize)]
struct HandlerSummary {
    name: String,
    kind: String,
    options: serde_json::Value,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), section = %args.section, "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    match (&result.error, result.warnings.len()) {
        (Some(_), _) => anyhow::bail!("Configuration validation failed"),
        (None, 0) => Ok(()),
        (None, count) => Err(CliError::ConfigWarnings { count }.into()),
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();
    let section = SectionPath::new(&args.section);

    match ConfigLoader::load_from_path(&args.config, &section) {
        Ok(parsed) => ValidationResult {
            valid: parsed.warnings.is_empty(),
            config_path,
            error: None,
            warnings: parsed.warnings.iter().map(ToString::to_string).collect(),
            summary: Some(summarize(&parsed)),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path: config_path.clone(),
            error: Some(CliError::config_parse(&args.config, e).to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

fn summarize(parsed: &ParsedConfig) -> ConfigSummary {
    ConfigSummary {
        is_default: parsed.is_default,
        handle_critical_errors: parsed.config.handle_critical_errors,
        minimal_filter: parsed.config.minimal_filter.map(|l| l.to_string()),
        handlers: parsed
            .config
            .entries()
            .map(|entry| HandlerSummary {
                name: entry.name.clone(),
                kind: entry.kind_candidates().next().unwrap_or(&entry.name).to_string(),
                options: entry.options_value(),
            })
            .collect(),
    }
}

fn print_validation_result(result: &ValidationResult) {
    if let Some(ref error) = result.error {
        println!("✗ Configuration is invalid: {}", result.config_path);
        println!("\n  Error: {}", error);
        return;
    }

    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);
    } else {
        println!("⚠ Configuration applies with ignored entries: {}", result.config_path);
    }

    if let Some(ref summary) = result.summary {
        if summary.is_default {
            println!("\n  (implicit default configuration)");
        }
        if let Some(enabled) = summary.handle_critical_errors {
            println!("  HandleCriticalErrors: {}", enabled);
        }
        if let Some(ref filter) = summary.minimal_filter {
            println!("  MinimalFilter: {}", filter);
        }
        println!("\n  Handlers ({}):", summary.handlers.len());
        for handler in &summary.handlers {
            println!("  - {} ({}) {}", handler.name, handler.kind, handler.options);
        }
    }

    if !result.warnings.is_empty() {
        println!("\n⚠ Warnings:");
        for warning in &result.warnings {
            println!("  - {}", warning);
        }
    }
}
