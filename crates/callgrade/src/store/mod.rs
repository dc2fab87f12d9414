//! External store interfaces.
//!
//! The store owns call records, the set of completed analyses, per-call
//! analysis status, and a key/value config table. Two backends:
//! - In-memory (tests, offline fixtures)
//! - REST (PostgREST-style database-as-a-service)

mod error;
mod memory;
mod rest;

pub use error::{StoreError, StoreResult};
pub use memory::{Fixture, InMemoryCallStore};
pub use rest::RestCallStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{AnalysisStatus, CallRow};

/// Server-side prefilter passed to the candidate listing.
///
/// The eligibility resolver re-checks every row, so backends may ignore fields
/// they cannot apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateFilter {
    /// Only rows with a non-empty transcript.
    #[serde(default)]
    pub has_transcript: bool,
    /// Only rows longer than this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_duration_secs: Option<u64>,
}

/// One page of candidate rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePage {
    pub rows: Vec<CallRow>,
    /// Total rows matching the filter across all pages, when the store reports it.
    pub total_count: Option<u64>,
}

/// Read/write access to call records.
///
/// Implementations must be thread-safe and handle concurrent access.
#[async_trait]
pub trait CallStore: Send + Sync {
    /// Fetch one page of candidate rows (offset pagination, stable order).
    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
        limit: usize,
        offset: usize,
    ) -> StoreResult<CandidatePage>;

    /// Identifiers of calls that already have a completed analysis.
    async fn list_analyzed_ids(&self) -> StoreResult<Vec<String>>;

    /// Record the outcome of scoring a call.
    async fn update_status(&self, call_id: &str, status: AnalysisStatus) -> StoreResult<()>;
}

/// Key/value access to the store's config table.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_value(&self, key: &str) -> StoreResult<Option<serde_json::Value>>;

    async fn set_value(&self, key: &str, value: serde_json::Value) -> StoreResult<()>;
}
