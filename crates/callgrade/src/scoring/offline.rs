//! Local scorer that grades transcripts with the quality heuristics.
//!
//! Lets the whole pipeline run without network access.

use async_trait::async_trait;
use serde_json::json;

use super::{CallScorer, ScoreRequest, ScoreResult};
use crate::quality;
use crate::retry::TaskError;

#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineScorer;

#[async_trait]
impl CallScorer for OfflineScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreResult, TaskError> {
        if request.transcript.trim().is_empty() {
            return Err(TaskError::Validation(format!(
                "call {} has an empty transcript",
                request.call_id
            )));
        }
        let report = quality::evaluate(&request.transcript);
        Ok(ScoreResult {
            // 0-100 quality score mapped onto a 0-10 grade
            final_grade: Some(f64::from(report.score) / 10.0),
            scorecard_used: Some(json!("offline-quality")),
        })
    }
}
