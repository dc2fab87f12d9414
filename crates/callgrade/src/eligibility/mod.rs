//! Eligibility resolution: which calls should be scored next.
//!
//! Pages through the store's candidate listing, applies the eligibility
//! predicate, and (unless force-reprocessing) drops calls that already have a
//! completed analysis. The analyzed set is fetched fresh on every resolution.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::models::{CallRow, WorkItem};
use crate::store::{CallStore, CandidateFilter, StoreResult};

/// Rows requested per store page.
pub const PAGE_SIZE: usize = 1000;
/// Hard cap on pages fetched per resolution.
pub const MAX_PAGES: usize = 10;

/// Fixed predicate a call must satisfy to be scored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityCriteria {
    pub min_transcript_chars: usize,
    pub min_segments: usize,
    /// Duration must be strictly greater than this.
    pub min_duration_secs: u64,
}

impl Default for EligibilityCriteria {
    fn default() -> Self {
        Self {
            min_transcript_chars: 100,
            min_segments: 3,
            min_duration_secs: 180,
        }
    }
}

impl EligibilityCriteria {
    pub fn with_min_duration(mut self, secs: u64) -> Self {
        self.min_duration_secs = secs;
        self
    }

    /// Check answered, transcript length, segment count and duration.
    pub fn accepts(&self, row: &CallRow) -> bool {
        let duration = row.duration_secs();
        let transcript = row.transcript_text().trim();

        duration > 0
            && transcript.chars().count() >= self.min_transcript_chars
            && row.segment_count() >= self.min_segments
            && duration > self.min_duration_secs
    }

    fn prefilter(&self) -> CandidateFilter {
        CandidateFilter {
            has_transcript: true,
            min_duration_secs: Some(self.min_duration_secs),
        }
    }
}

/// Resolves the list of calls eligible for scoring.
pub struct EligibilityResolver {
    store: Arc<dyn CallStore>,
    criteria: EligibilityCriteria,
    page_size: usize,
    max_pages: usize,
}

impl EligibilityResolver {
    pub fn new(store: Arc<dyn CallStore>, criteria: EligibilityCriteria) -> Self {
        Self {
            store,
            criteria,
            page_size: PAGE_SIZE,
            max_pages: MAX_PAGES,
        }
    }

    /// Override paging bounds.
    pub fn with_paging(mut self, page_size: usize, max_pages: usize) -> Self {
        self.page_size = page_size.max(1);
        self.max_pages = max_pages.max(1);
        self
    }

    /// List up to `limit` eligible calls, in store order.
    ///
    /// Any store error aborts the resolution.
    pub async fn list_eligible(
        &self,
        force_reprocess: bool,
        limit: usize,
    ) -> StoreResult<Vec<WorkItem>> {
        let rows = self.fetch_all().await?;

        let analyzed: HashSet<String> = if force_reprocess {
            HashSet::new()
        } else {
            self.store.list_analyzed_ids().await?.into_iter().collect()
        };

        let mut seen = HashSet::new();
        let items: Vec<WorkItem> = rows
            .iter()
            .filter(|row| self.criteria.accepts(row))
            .filter(|row| !analyzed.contains(&row.id))
            .filter(|row| seen.insert(row.id.clone()))
            .take(limit)
            .map(CallRow::to_work_item)
            .collect();

        info!(
            fetched = rows.len(),
            analyzed = analyzed.len(),
            eligible = items.len(),
            force_reprocess,
            "resolved eligible calls"
        );
        Ok(items)
    }

    async fn fetch_all(&self) -> StoreResult<Vec<CallRow>> {
        let filter = self.criteria.prefilter();
        let mut rows = Vec::new();

        for page in 0..self.max_pages {
            let offset = page * self.page_size;
            let result = self
                .store
                .list_candidates(&filter, self.page_size, offset)
                .await?;

            debug!(
                page,
                offset,
                returned = result.rows.len(),
                total = ?result.total_count,
                "fetched candidate page"
            );

            if result.rows.is_empty() {
                break;
            }
            rows.extend(result.rows);
            if let Some(total) = result.total_count {
                if rows.len() as u64 >= total {
                    break;
                }
            }
        }

        Ok(rows)
    }
}
