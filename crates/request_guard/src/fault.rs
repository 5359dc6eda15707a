//! Fault values observed by the guard

use std::fmt;

use contracts::ErrorInfo;
use dispatcher::critical::error_info;
use dispatcher::NULL_FAULT_MESSAGE;
use thiserror::Error;

/// Several independent faults raised by one unit of work.
#[derive(Debug)]
pub struct AggregateFault {
    faults: Vec<anyhow::Error>,
}

impl AggregateFault {
    pub fn new(faults: Vec<anyhow::Error>) -> Self {
        Self { faults }
    }

    pub fn faults(&self) -> &[anyhow::Error] {
        &self.faults
    }

    pub fn len(&self) -> usize {
        self.faults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }
}

impl fmt::Display for AggregateFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("One or more errors occurred.")?;
        for fault in &self.faults {
            write!(f, " ({fault})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateFault {}

/// Returned by a handler to report that its unit of work was canceled.
///
/// Cancellation is not a fault: nothing is logged as an error and the
/// status is left alone.
#[derive(Debug, Clone, Copy, Default, Error)]
#[error("request canceled")]
pub struct Canceled;

/// A single inner fault stands for its aggregate, recursively.
pub fn unwrap_single(error: anyhow::Error) -> anyhow::Error {
    match error.downcast::<AggregateFault>() {
        Ok(mut aggregate) if aggregate.faults.len() == 1 => {
            unwrap_single(aggregate.faults.remove(0))
        }
        Ok(aggregate) => anyhow::Error::new(aggregate),
        Err(error) => error,
    }
}

/// Loggable capture of a fault; an aggregate keeps all its inner faults.
pub fn fault_info(error: &anyhow::Error) -> ErrorInfo {
    let mut info = match error.downcast_ref::<AggregateFault>() {
        Some(aggregate) => ErrorInfo::aggregate(
            aggregate.to_string(),
            aggregate.faults.iter().map(fault_info).collect(),
        ),
        None => error_info(error),
    };
    if info.message.trim().is_empty() {
        info.message = NULL_FAULT_MESSAGE.to_string();
    }
    info
}

pub(crate) fn is_canceled(error: &anyhow::Error) -> bool {
    error.is::<Canceled>()
}
