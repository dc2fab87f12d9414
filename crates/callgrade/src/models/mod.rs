//! Data models shared across the scheduler components.

mod call;
mod stats;

pub use call::{count_segments, parse_hms, AnalysisStatus, CallRow, WorkItem};
pub use stats::RunStats;
