//! RequestGuard - binds a monitor to a unit of work and captures its faults
//!
//! Every exit path of the downstream invocation is observed by one bracket:
//! a panic while building the handler future, an `Err` or a panic while
//! polling it, and the future being dropped before completion.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};

use contracts::{ErrorInfo, LogLevel};
use dispatcher::{GrandOutput, Monitor, PanicError, StaticLogger};
use futures_util::FutureExt;
use http::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::fault::{fault_info, is_canceled, unwrap_single};

/// Tag of the fault line
pub const REQUEST_ERROR_TAG: &str = "RequestError";

/// Close reason after a fault
pub const REQUEST_ERROR_REASON: &str = "Request error.";

/// Close reason after a cancellation
pub const REQUEST_CANCELED_REASON: &str = "Request canceled.";

/// Text of the fault line when building the handler failed
pub const SYNCHRONOUS_ERROR_TEXT: &str = "Synchronous error in next middleware.";

/// What the guard needs from the host of a unit of work.
pub trait RequestScope {
    /// Monitor of this unit of work, if one is available
    fn monitor(&self) -> Option<Monitor>;

    /// Process-wide output to use when there is no monitor
    fn fallback_logger(&self) -> Option<GrandOutput> {
        None
    }

    /// Forces the response status
    fn set_status(&mut self, status: StatusCode);
}

/// Plain [`RequestScope`]: a monitor, a fallback and the recorded status.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    monitor: Option<Monitor>,
    fallback: Option<GrandOutput>,
    status: Option<StatusCode>,
}

impl UnitOfWork {
    pub fn new(monitor: Monitor) -> Self {
        Self {
            monitor: Some(monitor),
            ..Self::default()
        }
    }

    /// No monitor at all
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn with_fallback(mut self, output: GrandOutput) -> Self {
        self.fallback = Some(output);
        self
    }

    /// Status forced by the guard, if any
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

impl RequestScope for UnitOfWork {
    fn monitor(&self) -> Option<Monitor> {
        self.monitor.clone()
    }

    fn fallback_logger(&self) -> Option<GrandOutput> {
        self.fallback.clone()
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

/// Guard configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardOptions {
    /// Absorb faults after logging them instead of returning them
    pub swallow_errors: bool,
}

/// Terminal state of a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Completed,
    Faulted,
    Canceled,
}

impl RequestOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestOutcome::Completed => "completed",
            RequestOutcome::Faulted => "faulted",
            RequestOutcome::Canceled => "canceled",
        }
    }
}

/// Error surfaced to the caller of a guarded unit of work
#[derive(Debug, Error)]
pub enum GuardError {
    /// The handler faulted and the fault was not swallowed
    #[error("request faulted: {0}")]
    Faulted(anyhow::Error),

    /// The handler reported a cancellation
    #[error("request canceled")]
    Canceled,
}

impl GuardError {
    /// Status the response must carry
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            GuardError::Faulted(_) => Some(StatusCode::INTERNAL_SERVER_ERROR),
            GuardError::Canceled => None,
        }
    }

    pub fn fault(&self) -> Option<&anyhow::Error> {
        match self {
            GuardError::Faulted(e) => Some(e),
            GuardError::Canceled => None,
        }
    }
}

/// Closes the monitor as canceled when the guarded future is dropped
/// before reaching a terminal state.
struct CancelOnDrop {
    monitor: Option<Monitor>,
    fallback: Option<GrandOutput>,
    armed: bool,
}

impl CancelOnDrop {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            close_canceled(self.monitor.as_ref(), self.fallback.take());
        }
    }
}

/// Exactly one "Request canceled." line: the monitor's closing line, else
/// an unfiltered Fatal line through the fallback.
fn close_canceled(monitor: Option<&Monitor>, fallback: Option<GrandOutput>) {
    match monitor {
        Some(monitor) if !monitor.is_closed() => {
            monitor.close(Some(REQUEST_CANCELED_REASON));
        }
        _ => log_without_monitor(fallback, None, REQUEST_CANCELED_REASON, None),
    }
    observability::record_request(RequestOutcome::Canceled.as_str());
    debug!("Request canceled");
}

/// Error guard around one unit of work.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestGuard {
    options: GuardOptions,
}

impl RequestGuard {
    pub fn new(options: GuardOptions) -> Self {
        Self { options }
    }

    pub fn swallow_errors(&self) -> bool {
        self.options.swallow_errors
    }

    /// Runs `handler` for the unit of work described by `scope`.
    ///
    /// * completed: the monitor is closed normally, `Ok(Some(value))`;
    /// * faulted: status 500, one Fatal line carrying the fault, monitor
    ///   closed with "Request error.", then `Ok(None)` when swallowing or
    ///   `Err(GuardError::Faulted)`;
    /// * canceled (`Canceled` error or the returned future dropped): the
    ///   monitor is closed with "Request canceled.", `Err(GuardError::Canceled)`.
    pub async fn run<S, F, Fut, T>(&self, scope: &mut S, handler: F) -> Result<Option<T>, GuardError>
    where
        S: RequestScope + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let monitor = scope.monitor();
        let mut cancel = CancelOnDrop {
            monitor: monitor.clone(),
            fallback: scope.fallback_logger(),
            armed: true,
        };

        // Empty text: the fault came out of the running future.
        let (result, text) = match catch_unwind(AssertUnwindSafe(handler)) {
            Ok(future) => match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => (result, ""),
                Err(payload) => (Err(panic_error(payload.as_ref())), ""),
            },
            Err(payload) => (Err(panic_error(payload.as_ref())), SYNCHRONOUS_ERROR_TEXT),
        };
        cancel.disarm();

        match result {
            Ok(value) => {
                if let Some(monitor) = &monitor {
                    monitor.close(None);
                }
                observability::record_request(RequestOutcome::Completed.as_str());
                Ok(Some(value))
            }
            Err(error) if is_canceled(&error) => {
                close_canceled(monitor.as_ref(), scope.fallback_logger());
                Err(GuardError::Canceled)
            }
            Err(error) => {
                let error = unwrap_single(error);
                scope.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                log_fault(scope, monitor.as_ref(), text, &error);
                observability::record_request(RequestOutcome::Faulted.as_str());
                if self.options.swallow_errors {
                    Ok(None)
                } else {
                    Err(GuardError::Faulted(error))
                }
            }
        }
    }
}

fn panic_error(payload: &(dyn std::any::Any + Send)) -> anyhow::Error {
    anyhow::Error::new(PanicError::from_payload(payload))
}

/// Exactly one Fatal line: through the monitor, else the scope's fallback
/// output, else the static logger.
fn log_fault<S: RequestScope + ?Sized>(
    scope: &S,
    monitor: Option<&Monitor>,
    text: &str,
    error: &anyhow::Error,
) {
    let info = fault_info(error);
    if let Some(monitor) = monitor {
        if !monitor.is_closed() {
            monitor.unfiltered_log(LogLevel::Fatal, Some(REQUEST_ERROR_TAG), text, Some(info));
            monitor.close(Some(REQUEST_ERROR_REASON));
            return;
        }
    }
    log_without_monitor(scope.fallback_logger(), Some(REQUEST_ERROR_TAG), text, Some(info));
}

fn log_without_monitor(
    fallback: Option<GrandOutput>,
    tag: Option<&str>,
    text: &str,
    error: Option<ErrorInfo>,
) {
    match fallback {
        Some(output) if output.is_external_log_enabled(LogLevel::Fatal) => {
            output.external_log(LogLevel::Fatal, text, error);
        }
        _ => {
            warn!(text, "No monitor for request, using static logger");
            StaticLogger::send(LogLevel::Fatal, tag, text, error);
        }
    }
}
