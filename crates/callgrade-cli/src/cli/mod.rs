//! Command-line interface for callgrade.

mod commands;
pub mod progress;

pub use commands::{is_verbose, run};
