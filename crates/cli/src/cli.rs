//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// GrandOutput - structured log pipeline with hot-swappable sinks
#[derive(Parser, Debug)]
#[command(
    name = "grand-output",
    author,
    version,
    about = "Structured log pipeline with hot-swappable sinks",
    long_about = "Routes monitor log lines to the text and binary file sinks described by a \n\
                  configuration file, and reconfigures them whenever the file changes."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "GRAND_OUTPUT_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "GRAND_OUTPUT_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a configuration file and log stdin lines through it
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Print the lines of a binary (.ckmon) log file
    Dump(DumpArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (JSON or TOML)
    #[arg(
        short,
        long,
        default_value = "appsettings.json",
        env = "GRAND_OUTPUT_CONFIG"
    )]
    pub config: PathBuf,

    /// Configuration section holding the `GrandOutput` object (colon separated)
    #[arg(long, default_value = "Monitoring", env = "GRAND_OUTPUT_SECTION")]
    pub section: String,

    /// Root log directory (defaults to ./Logs)
    #[arg(long, env = "GRAND_OUTPUT_ROOT")]
    pub root: Option<PathBuf>,

    /// Emit critical errors as Fatal lines
    #[arg(long, env = "GRAND_OUTPUT_CRITICAL_ERRORS")]
    pub critical_errors: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "GRAND_OUTPUT_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "appsettings.json")]
    pub config: PathBuf,

    /// Configuration section holding the `GrandOutput` object
    #[arg(long, default_value = "Monitoring")]
    pub section: String,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `dump` command
#[derive(Parser, Debug)]
pub struct DumpArgs {
    /// Binary log file
    pub file: PathBuf,

    /// Output one JSON object per line
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
