//! # Dispatcher
//!
//! 日志分发模块。
//!
//! 负责：
//! - `GrandOutput`：将日志行 fan-out 到当前激活的 sinks
//! - 按配置快照调和 sinks（激活 / 替换 / 停用），不丢行
//! - `Monitor`：每个工作单元一个，逻辑时间严格递增
//! - 关键错误通道、静态兜底日志、可选的进程级默认实例
//! - 内置 sinks：TextFile、BinaryFile (`.ckmon`)、Tracing

pub mod critical;
pub mod default;
pub mod error;
pub mod grand_output;
pub mod handle;
pub mod metrics;
pub mod monitor;
pub mod registry;
pub mod root;
pub mod sinks;
pub mod static_logger;

pub use contracts::{LogLevel, LogLine, LogSink, OutputConfig, SinkEntry};
pub use critical::{PanicError, NULL_FAULT_MESSAGE};
pub use error::DispatcherError;
pub use grand_output::{
    create_grand_output, GrandOutput, GrandOutputBuilder, ReconcileReport, CRITICAL_ERROR_TAG,
    GRAND_OUTPUT_TAG,
};
pub use handle::{PendingSink, SinkHandle};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use monitor::{Monitor, DEFAULT_CLOSE_REASON, MONITOR_END_TAG};
pub use registry::{OutputContext, SinkRegistry};
pub use sinks::{
    format_line, log_files, read_binary_log, BinaryFileOptions, BinaryFileSink, MemorySink,
    MemoryStore, TextFileOptions, TextFileSink, TracingSink, BINARY_FILE_EXTENSION, MEMORY_KIND,
    TEXT_FILE_EXTENSION, TRACING_KIND,
};
pub use static_logger::StaticLogger;
