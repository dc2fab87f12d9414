//! External scoring function interface.
//!
//! A scorer turns one call transcript into a grade. Failures are returned as
//! tagged [`TaskError`]s so the batch processor's retry policy never has to
//! inspect message text.

mod http;
mod offline;

pub use http::HttpCallScorer;
pub use offline::OfflineScorer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::WorkItem;
use crate::retry::TaskError;

/// Payload sent to the scoring function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub call_id: String,
    pub transcript: String,
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub force_reprocess: bool,
}

impl ScoreRequest {
    pub fn for_item(item: &WorkItem, force_reprocess: bool) -> Self {
        Self {
            call_id: item.id.clone(),
            transcript: item.transcript.clone(),
            company_name: item.company_name.clone(),
            contact_name: item.contact_name.clone(),
            force_reprocess,
        }
    }
}

/// Scoring function response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    #[serde(default)]
    pub final_grade: Option<f64>,
    #[serde(default)]
    pub scorecard_used: Option<serde_json::Value>,
}

impl ScoreResult {
    /// The grade, or a validation error when the result has none.
    pub fn grade(&self) -> Result<f64, TaskError> {
        self.final_grade
            .filter(|g| g.is_finite())
            .ok_or_else(|| TaskError::Validation("scoring result has no final grade".into()))
    }
}

#[async_trait]
pub trait CallScorer: Send + Sync {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreResult, TaskError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_requires_value() {
        let ok = ScoreResult {
            final_grade: Some(7.5),
            scorecard_used: None,
        };
        assert_eq!(ok.grade(), Ok(7.5));
        assert!(matches!(
            ScoreResult::default().grade(),
            Err(TaskError::Validation(_))
        ));
        let nan = ScoreResult {
            final_grade: Some(f64::NAN),
            scorecard_used: None,
        };
        assert!(nan.grade().is_err());
    }

    #[test]
    fn test_request_from_item() {
        let item = WorkItem {
            id: "c1".into(),
            transcript: "hello".into(),
            duration_secs: 200,
            segment_count: 1,
            company_name: Some("Acme".into()),
            contact_name: None,
        };
        let req = ScoreRequest::for_item(&item, true);
        assert_eq!(req.call_id, "c1");
        assert_eq!(req.company_name.as_deref(), Some("Acme"));
        assert!(req.force_reprocess);
    }
}
