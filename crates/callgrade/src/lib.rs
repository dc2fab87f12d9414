//! callgrade - background scheduler for AI quality scoring of recorded calls.
//!
//! Discovers calls eligible for scoring, filters them through eligibility and
//! transcript-quality rules, scores them in concurrent batches with retries,
//! and keeps run statistics for status consumers.

// Status and flag types use `from_str` methods that return Option<Self>,
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod batch;
pub mod cancel;
pub mod config;
pub mod eligibility;
pub mod models;
pub mod quality;
pub mod retry;
pub mod scheduler;
pub mod scoring;
pub mod store;
