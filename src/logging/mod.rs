//! Logging for the dataset preparation pipeline
//!
//! - Bracketed event format shared by every layer
//! - Dual output (log file + stdout)
//! - One timestamped log file per run

mod formatter;
mod setup;

pub use setup::{setup_logging, setup_stdout_logging};
