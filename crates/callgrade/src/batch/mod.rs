//! Concurrent batch scoring with per-item failure isolation.
//!
//! Every item in a batch is scored concurrently through the retry executor;
//! the batch completes once every item has settled. One item's failure never
//! affects the others.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::models::{AnalysisStatus, WorkItem};
use crate::retry::{run_with_retry_cancellable, RetryPolicy, TaskError};
use crate::scoring::{CallScorer, ScoreRequest, ScoreResult};
use crate::store::CallStore;

/// Error reported for items skipped after cancellation.
pub const CANCELLED: &str = "cancelled";

/// Progress events emitted while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// Sent in input order before any item starts. `index` is 1-based.
    ItemStarted {
        index: usize,
        total: usize,
        label: String,
    },
    ItemSucceeded {
        call_id: String,
        grade: f64,
    },
    ItemFailed {
        call_id: String,
        error: String,
    },
}

/// Outcome of scoring one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub call_id: String,
    pub success: bool,
    pub score: Option<f64>,
    pub error: Option<String>,
}

impl ItemResult {
    fn succeeded(call_id: &str, score: f64) -> Self {
        Self {
            call_id: call_id.to_string(),
            success: true,
            score: Some(score),
            error: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        !self.success && self.error.as_deref() == Some(CANCELLED)
    }

    fn failed(call_id: &str, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.to_string(),
            success: false,
            score: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregate of a batch run. `results` is in input order.
///
/// Items skipped after cancellation appear in `results` with the
/// [`CANCELLED`] error but only count towards `cancelled_count`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub success_count: usize,
    pub failure_count: usize,
    #[serde(default)]
    pub cancelled_count: usize,
    pub results: Vec<ItemResult>,
}

impl BatchOutcome {
    /// Items that were actually attempted.
    pub fn processed(&self) -> usize {
        self.success_count + self.failure_count
    }
}

/// Scores batches of work items.
#[derive(Clone)]
pub struct BatchProcessor {
    scorer: Arc<dyn CallScorer>,
    store: Arc<dyn CallStore>,
    policy: RetryPolicy,
    status_policy: RetryPolicy,
    score_timeout: Duration,
    cancel: CancelToken,
}

impl BatchProcessor {
    pub fn new(scorer: Arc<dyn CallScorer>, store: Arc<dyn CallStore>) -> Self {
        Self {
            scorer,
            store,
            policy: RetryPolicy::analysis(),
            status_policy: RetryPolicy::default(),
            score_timeout: Duration::from_secs(120),
            cancel: CancelToken::never(),
        }
    }

    /// Retry policy for scoring calls.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Retry policy for status write-backs.
    pub fn with_status_policy(mut self, policy: RetryPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    /// Upper bound on a single scoring attempt.
    pub fn with_score_timeout(mut self, timeout: Duration) -> Self {
        self.score_timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Score every item concurrently and wait for all of them to settle.
    pub async fn process_batch(
        &self,
        items: &[WorkItem],
        force_reprocess: bool,
        events: Option<&mpsc::Sender<BatchEvent>>,
    ) -> BatchOutcome {
        let total = items.len();
        let mut pending = Vec::with_capacity(total);

        for (index, item) in items.iter().enumerate() {
            let label = item.display_label(index);
            debug!(call_id = %item.id, index = index + 1, total, label = %label, "queueing call");
            emit(
                events,
                BatchEvent::ItemStarted {
                    index: index + 1,
                    total,
                    label,
                },
            )
            .await;
            pending.push(self.process_item(item, force_reprocess, events));
        }

        let results = join_all(pending).await;
        let success_count = results.iter().filter(|r| r.success).count();
        let cancelled_count = results.iter().filter(|r| r.is_cancelled()).count();
        let failure_count = total - success_count - cancelled_count;

        info!(
            total,
            succeeded = success_count,
            failed = failure_count,
            cancelled = cancelled_count,
            "batch complete"
        );

        BatchOutcome {
            success_count,
            failure_count,
            cancelled_count,
            results,
        }
    }

    async fn process_item(
        &self,
        item: &WorkItem,
        force_reprocess: bool,
        events: Option<&mpsc::Sender<BatchEvent>>,
    ) -> ItemResult {
        if self.cancel.is_cancelled() {
            debug!(call_id = %item.id, "skipping call after cancellation");
            emit(
                events,
                BatchEvent::ItemFailed {
                    call_id: item.id.clone(),
                    error: CANCELLED.to_string(),
                },
            )
            .await;
            return ItemResult::failed(&item.id, CANCELLED);
        }

        let request = ScoreRequest::for_item(item, force_reprocess);
        let context = format!("score call {}", item.id);

        match self.score_with_retry(&request, &context).await {
            Ok(grade) => {
                info!(call_id = %item.id, grade, "call scored");
                self.write_status(&item.id, AnalysisStatus::Completed).await;
                emit(
                    events,
                    BatchEvent::ItemSucceeded {
                        call_id: item.id.clone(),
                        grade,
                    },
                )
                .await;
                ItemResult::succeeded(&item.id, grade)
            }
            Err(e) => {
                warn!(call_id = %item.id, kind = e.kind(), error = %e, "call scoring failed");
                self.write_status(&item.id, AnalysisStatus::Failed).await;
                emit(
                    events,
                    BatchEvent::ItemFailed {
                        call_id: item.id.clone(),
                        error: e.to_string(),
                    },
                )
                .await;
                ItemResult::failed(&item.id, e.to_string())
            }
        }
    }

    async fn score_with_retry(
        &self,
        request: &ScoreRequest,
        context: &str,
    ) -> Result<f64, TaskError> {
        let scorer = &self.scorer;
        let timeout = self.score_timeout;

        let result: ScoreResult =
            run_with_retry_cancellable(&self.policy, context, &self.cancel, move || async move {
                let result = match tokio::time::timeout(timeout, scorer.score(request)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        return Err(TaskError::Retryable(format!(
                            "scoring call timed out after {}s",
                            timeout.as_secs()
                        )))
                    }
                };
                result.grade()?;
                Ok::<_, TaskError>(result)
            })
            .await?;

        result.grade()
    }

    /// Best-effort status write-back. Failures are logged, never returned.
    async fn write_status(&self, call_id: &str, status: AnalysisStatus) {
        let context = format!("update status of call {}", call_id);
        let store = &self.store;
        let result = run_with_retry_cancellable(
            &self.status_policy,
            &context,
            &self.cancel,
            move || async move { store.update_status(call_id, status).await },
        )
        .await;

        if let Err(e) = result {
            warn!(call_id, status = status.as_str(), error = %e, "status write-back failed");
        }
    }
}

async fn emit(events: Option<&mpsc::Sender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = events {
        // a dropped receiver only means nobody is watching
        let _ = tx.send(event).await;
    }
}
