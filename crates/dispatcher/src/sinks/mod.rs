//! Sink implementations
//!
//! Contains TextFileSink, BinaryFileSink, TracingSink and MemorySink.

mod binary;
mod memory;
mod options;
mod rotating;
mod text;
mod tracing_sink;

pub use self::binary::{
    read_binary_log, BinaryFileOptions, BinaryFileSink, BINARY_FILE_EXTENSION,
};
pub use self::memory::{MemorySink, MemoryStore, MEMORY_KIND};
pub use self::options::SinkOptions;
pub use self::rotating::log_files;
pub use self::text::{format_line, TextFileOptions, TextFileSink, TEXT_FILE_EXTENSION};
pub use self::tracing_sink::{TracingSink, TRACING_KIND};

pub(crate) use self::tracing_sink::emit_event;
