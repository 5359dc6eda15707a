//! BinaryFileSink - compact `.ckmon` record streams
//!
//! File layout: `CKMON\0` magic, a little-endian u16 version, then records
//! made of a little-endian u32 length followed by the bincode encoded line.

use std::path::Path;

use bytes::{Buf, BufMut, BytesMut};
use contracts::{ContractError, LogLine, LogSink, SinkEntry};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use validator::Validate;

use super::rotating::RotatingFile;
use super::options::{parse_options, SinkOptions};
use crate::registry::OutputContext;

/// Extension of binary log files
pub const BINARY_FILE_EXTENSION: &str = "ckmon";

const MAGIC: &[u8; 6] = b"CKMON\0";
const VERSION: u16 = 1;
const HEADER: &[u8; 8] = b"CKMON\0\x01\x00";

/// Options of a `BinaryFile` entry
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", default)]
pub struct BinaryFileOptions {
    /// Folder under the root log path
    #[validate(length(min = 1))]
    pub path: String,

    /// Records per file before switching to a new one
    #[validate(range(min = 1))]
    pub max_count_per_file: usize,
}

impl Default for BinaryFileOptions {
    fn default() -> Self {
        Self {
            path: "CKMon".to_string(),
            max_count_per_file: 20_000,
        }
    }
}

impl SinkOptions for BinaryFileOptions {
    const KEYS: &'static [&'static str] = &["Path", "MaxCountPerFile"];
}

/// Sink appending bincode records to rotating `.ckmon` files
pub struct BinaryFileSink {
    name: String,
    file: RotatingFile,
    buffer: BytesMut,
}

impl BinaryFileSink {
    pub fn new(
        name: impl Into<String>,
        options: BinaryFileOptions,
        context: &OutputContext,
    ) -> Self {
        Self {
            name: name.into(),
            file: RotatingFile::new(
                context.resolve(&options.path),
                BINARY_FILE_EXTENSION,
                options.max_count_per_file,
            )
            .with_header(HEADER),
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Factory registered under `BinaryFile`
    pub fn from_entry(entry: &SinkEntry, context: &OutputContext) -> Result<Self, ContractError> {
        let options = parse_options(entry)?;
        Ok(Self::new(&entry.name, options, context))
    }

    fn io_error(&self, e: impl std::fmt::Display) -> ContractError {
        ContractError::sink_io(&self.name, e.to_string())
    }
}

impl LogSink for BinaryFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "binary_sink_activate", skip(self), fields(sink = %self.name))]
    async fn activate(&mut self) -> Result<(), ContractError> {
        self.file.open().map_err(|e| self.io_error(e))?;
        debug!(path = ?self.file.current_path(), "Binary sink activated");
        Ok(())
    }

    async fn handle(&mut self, line: &LogLine) -> Result<(), ContractError> {
        let payload = bincode::serialize(line).map_err(|e| self.io_error(e))?;
        let len = u32::try_from(payload.len()).map_err(|e| self.io_error(e))?;

        self.buffer.clear();
        self.buffer.put_u32_le(len);
        self.buffer.extend_from_slice(&payload);
        let result = self.file.write_record(&self.buffer);
        result.map_err(|e| self.io_error(e))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.file.flush().map_err(|e| self.io_error(e))
    }

    #[instrument(name = "binary_sink_deactivate", skip(self), fields(sink = %self.name))]
    async fn deactivate(&mut self) -> Result<(), ContractError> {
        self.file.close().map_err(|e| self.io_error(e))
    }
}

/// Reads every line of a `.ckmon` file.
///
/// A truncated last record (crash while writing) ends the read without
/// error.
///
/// # Errors
/// I/O failure, bad magic, unsupported version or a corrupt record.
pub fn read_binary_log(path: &Path) -> Result<Vec<LogLine>, ContractError> {
    let content = std::fs::read(path)?;
    let mut buf = content.as_slice();

    if buf.len() < HEADER.len() || &buf[..MAGIC.len()] != MAGIC {
        return Err(ContractError::Other(format!(
            "{}: not a binary log file",
            path.display()
        )));
    }
    buf.advance(MAGIC.len());
    let version = buf.get_u16_le();
    if version != VERSION {
        return Err(ContractError::Other(format!(
            "{}: unsupported binary log version {version}",
            path.display()
        )));
    }

    let mut lines = Vec::new();
    while buf.remaining() >= 4 {
        let len = buf.get_u32_le() as usize;
        if buf.remaining() < len {
            warn!(path = ?path, "Truncated record at end of binary log");
            break;
        }
        let line: LogLine = bincode::deserialize(&buf[..len]).map_err(|e| {
            ContractError::Other(format!("{}: corrupt record: {e}", path.display()))
        })?;
        buf.advance(len);
        lines.push(line);
    }
    Ok(lines)
}
