//! LogSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for Sinks.

use crate::{ContractError, LogLine};

/// Log line output trait
///
/// All sink implementations must implement this trait. Only the dispatcher
/// calls `activate` / `deactivate`; `handle` is called from the sink's own
/// worker so lines reach one sink in emission order.
#[trait_variant::make(LogSink: Send)]
pub trait LocalLogSink {
    /// Sink name (configuration key, used for logging/metrics)
    fn name(&self) -> &str;

    /// Acquire the resources (directories, file handles)
    ///
    /// # Errors
    /// Returns configuration or I/O error; the sink is then excluded
    async fn activate(&mut self) -> Result<(), ContractError>;

    /// Persist one line
    async fn handle(&mut self, line: &LogLine) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Flush and release every resource
    async fn deactivate(&mut self) -> Result<(), ContractError>;
}
