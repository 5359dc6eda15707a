//! Faults caught outside any monitor: panics and background task errors.

use std::any::Any;

use contracts::ErrorInfo;
use thiserror::Error;

/// Marker used when a fault carries nothing printable
pub const NULL_FAULT_MESSAGE: &str = "Null exception on faulted request.";

/// A panic turned into an error value
#[derive(Debug, Clone, Error)]
#[error("panic: {message}")]
pub struct PanicError {
    pub message: String,
}

impl PanicError {
    /// Builds the error out of a `catch_unwind` payload.
    ///
    /// Payloads other than `&str` / `String` become the null-fault marker.
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        Self {
            message: panic_message(payload).unwrap_or_else(|| NULL_FAULT_MESSAGE.to_string()),
        }
    }
}

/// Text of a panic payload, when it has one.
pub fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
}

/// Captures an `anyhow` error and its context chain.
pub fn error_info(error: &anyhow::Error) -> ErrorInfo {
    let chain: Vec<String> = error.chain().map(ToString::to_string).collect();
    chain
        .into_iter()
        .rev()
        .fold(None, |inner: Option<ErrorInfo>, message| {
            Some(ErrorInfo {
                message,
                inner: inner.into_iter().collect(),
            })
        })
        .unwrap_or_else(|| ErrorInfo::new(NULL_FAULT_MESSAGE))
}
