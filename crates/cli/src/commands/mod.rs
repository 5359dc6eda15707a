//! Command implementations.

mod dump;
mod run;
mod validate;

pub use dump::run_dump;
pub use run::run_output;
pub use validate::run_validate;
