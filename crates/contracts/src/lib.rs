//! # Contracts
//!
//! Frozen interface contracts shared by the monitoring crates: log lines and
//! their levels, monitor identities, the sink trait and the configuration
//! snapshot exchanged between the loader and the dispatcher.
//! Business crates depend on this crate only, never the reverse.
//!
//! ## Time Model
//! - Every line carries a [`LogTime`]: wall-clock UTC timestamp plus a
//!   uniquifier that keeps times strictly increasing per emitter.

mod config;
mod error;
mod level;
mod line;
mod sink;
mod time;

pub use config::*;
pub use error::*;
pub use level::LogLevel;
pub use line::*;
pub use sink::*;
pub use time::{LogClock, LogTime};
