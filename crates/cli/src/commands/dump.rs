//! `dump` command implementation.

use std::io::Write;

use anyhow::{Context, Result};
use dispatcher::{format_line, read_binary_log};
use tracing::info;

use crate::cli::DumpArgs;
use crate::error::CliError;

/// Execute the `dump` command
pub fn run_dump(args: &DumpArgs) -> Result<()> {
    let lines = read_binary_log(&args.file).map_err(|e| CliError::binary_log(&args.file, e))?;
    info!(file = %args.file.display(), lines = lines.len(), "Binary log read");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut buffer = String::new();
    for line in &lines {
        if args.json {
            let json = serde_json::to_string(line).context("Failed to serialize log line")?;
            writeln!(out, "{json}").map_err(CliError::from)?;
        } else {
            buffer.clear();
            format_line(line, &mut buffer);
            write!(out, "{buffer}").map_err(CliError::from)?;
        }
    }
    out.flush().map_err(CliError::from)?;
    Ok(())
}
