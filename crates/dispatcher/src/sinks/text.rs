//! TextFileSink - human readable log files

use std::fmt::Write as _;

use contracts::{ContractError, LogLine, LogSink, SinkEntry};
use serde::Deserialize;
use tracing::{debug, instrument};
use validator::Validate;

use super::options::{parse_options, SinkOptions};
use super::rotating::RotatingFile;
use crate::registry::OutputContext;

/// Extension of text log files
pub const TEXT_FILE_EXTENSION: &str = "log";

/// Options of a `TextFile` entry
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", default)]
pub struct TextFileOptions {
    /// Folder under the root log path
    #[validate(length(min = 1))]
    pub path: String,

    /// Lines per file before switching to a new one
    #[validate(range(min = 1))]
    pub max_count_per_file: usize,
}

impl Default for TextFileOptions {
    fn default() -> Self {
        Self {
            path: contracts::DEFAULT_TEXT_PATH.to_string(),
            max_count_per_file: 20_000,
        }
    }
}

impl SinkOptions for TextFileOptions {
    const KEYS: &'static [&'static str] = &["Path", "MaxCountPerFile"];
}

/// Sink appending formatted lines to rotating `.log` files
pub struct TextFileSink {
    name: String,
    file: RotatingFile,
    buffer: String,
}

impl TextFileSink {
    pub fn new(name: impl Into<String>, options: TextFileOptions, context: &OutputContext) -> Self {
        Self {
            name: name.into(),
            file: RotatingFile::new(
                context.resolve(&options.path),
                TEXT_FILE_EXTENSION,
                options.max_count_per_file,
            ),
            buffer: String::new(),
        }
    }

    /// Factory registered under `TextFile`
    pub fn from_entry(entry: &SinkEntry, context: &OutputContext) -> Result<Self, ContractError> {
        let options = parse_options(entry)?;
        Ok(Self::new(&entry.name, options, context))
    }

    fn io_error(&self, e: std::io::Error) -> ContractError {
        ContractError::sink_io(&self.name, e.to_string())
    }
}

/// `<time> <monitor> <level> [<tags>] <text>` then one indented line per
/// nested error.
pub fn format_line(line: &LogLine, out: &mut String) {
    let monitor = line
        .monitor_id
        .map(|id| id.short())
        .unwrap_or_else(|| "-".repeat(8));
    let _ = write!(out, "{} {} {} ", line.time, monitor, line.level.as_char());
    if let Some(tags) = &line.tags {
        let _ = write!(out, "[{tags}] ");
    }
    let mut text_lines = line.text.lines();
    out.push_str(text_lines.next().unwrap_or(""));
    out.push('\n');
    for continuation in text_lines {
        out.push_str("    ");
        out.push_str(continuation);
        out.push('\n');
    }
    if let Some(error) = &line.error {
        error.walk(1, &mut |depth, e| {
            let _ = writeln!(out, "{}| {}", "  ".repeat(depth * 2), e.message);
        });
    }
}

impl LogSink for TextFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "text_sink_activate", skip(self), fields(sink = %self.name))]
    async fn activate(&mut self) -> Result<(), ContractError> {
        self.file.open().map_err(|e| self.io_error(e))?;
        debug!(path = ?self.file.current_path(), "Text sink activated");
        Ok(())
    }

    async fn handle(&mut self, line: &LogLine) -> Result<(), ContractError> {
        self.buffer.clear();
        format_line(line, &mut self.buffer);
        let result = self.file.write_record(self.buffer.as_bytes());
        result.map_err(|e| self.io_error(e))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.file.flush().map_err(|e| self.io_error(e))
    }

    #[instrument(name = "text_sink_deactivate", skip(self), fields(sink = %self.name))]
    async fn deactivate(&mut self) -> Result<(), ContractError> {
        self.file.close().map_err(|e| self.io_error(e))
    }
}
