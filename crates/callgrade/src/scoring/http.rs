//! HTTP scoring function client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::{CallScorer, ScoreRequest, ScoreResult};
use crate::config::Settings;
use crate::retry::TaskError;

/// Characters of an error body kept in error messages.
const MAX_ERROR_BODY: usize = 500;

/// Calls a remote scoring function with `POST {url}`.
///
/// Only connecting is bounded here. Scoring can take minutes, so the total
/// request time is left to the caller's per-attempt timeout.
#[derive(Clone)]
pub struct HttpCallScorer {
    client: Client,
    url: String,
}

impl HttpCallScorer {
    pub fn new(
        url: &str,
        api_key: Option<&str>,
        connect_timeout: Duration,
    ) -> Result<Self, TaskError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| TaskError::Fatal(format!("invalid API key: {}", e)))?;
            let apikey = HeaderValue::from_str(key)
                .map_err(|e| TaskError::Fatal(format!("invalid API key: {}", e)))?;
            headers.insert(AUTHORIZATION, bearer);
            headers.insert("apikey", apikey);
        }

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TaskError::Fatal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, TaskError> {
        let url = settings
            .scoring_endpoint()
            .ok_or_else(|| TaskError::Fatal("scoring URL is not configured".into()))?;
        Self::new(
            &url,
            settings.store_api_key.as_deref(),
            Duration::from_secs(settings.request_timeout_secs),
        )
    }
}

fn classify_transport(err: reqwest::Error) -> TaskError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        TaskError::Retryable(format!("scoring request failed (network): {}", err))
    } else {
        TaskError::from_message(format!("scoring request failed: {}", err))
    }
}

fn classify_status(status: StatusCode, body: &str) -> TaskError {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    let message = format!("scoring service returned {}: {}", status.as_u16(), body);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        TaskError::Retryable(message)
    } else {
        TaskError::Fatal(message)
    }
}

#[async_trait]
impl CallScorer for HttpCallScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreResult, TaskError> {
        debug!(call_id = %request.call_id, url = %self.url, "requesting score");

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let result: ScoreResult = serde_json::from_str(&body).map_err(|e| {
            TaskError::Validation(format!("invalid scoring response: {}", e))
        })?;
        result.grade()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn request() -> ScoreRequest {
        ScoreRequest {
            call_id: "c1".into(),
            transcript: "hello there".into(),
            company_name: Some("Acme".into()),
            contact_name: None,
            force_reprocess: false,
        }
    }

    fn scorer(base: &str, path: &str) -> HttpCallScorer {
        HttpCallScorer::new(&format!("{base}{path}"), Some("k"), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_score_success_sends_payload() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let app = Router::new().route(
            "/grade",
            post(move |Json(body): Json<Value>| {
                let counter = counter.clone();
                async move {
                    assert_eq!(body["call_id"], "c1");
                    assert_eq!(body["company_name"], "Acme");
                    assert_eq!(body["force_reprocess"], false);
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!({ "final_grade": 8.5, "scorecard_used": "default" }))
                }
            }),
        );
        let base = serve(app).await;

        let result = scorer(&base, "/grade").score(&request()).await.unwrap();
        assert_eq!(result.final_grade, Some(8.5));
        assert_eq!(result.scorecard_used, Some(json!("default")));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_status_classification() {
        let app = Router::new()
            .route(
                "/busy",
                post(|| async { (AxumStatus::TOO_MANY_REQUESTS, "slow down") }),
            )
            .route(
                "/down",
                post(|| async { (AxumStatus::BAD_GATEWAY, "upstream") }),
            )
            .route(
                "/bad",
                post(|| async { (AxumStatus::BAD_REQUEST, "no transcript") }),
            )
            .route("/empty", post(|| async { Json(json!({ "final_grade": null })) }));
        let base = serve(app).await;

        let busy = scorer(&base, "/busy").score(&request()).await.unwrap_err();
        assert!(matches!(busy, TaskError::Retryable(_)));
        let down = scorer(&base, "/down").score(&request()).await.unwrap_err();
        assert!(matches!(down, TaskError::Retryable(_)));
        let bad = scorer(&base, "/bad").score(&request()).await.unwrap_err();
        assert!(matches!(bad, TaskError::Fatal(_)));
        assert!(bad.message().contains("no transcript"));
        let empty = scorer(&base, "/empty").score(&request()).await.unwrap_err();
        assert!(matches!(empty, TaskError::Validation(_)));
    }

    #[tokio::test]
    async fn test_slow_scoring_outlives_request_timeout() {
        use crate::batch::BatchProcessor;
        use crate::config::WorkerConfig;
        use crate::models::WorkItem;
        use crate::store::InMemoryCallStore;

        let app = Router::new().route(
            "/grade",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(1500)).await;
                Json(json!({ "final_grade": 7.0 }))
            }),
        );
        let base = serve(app).await;

        let settings = Settings {
            scoring_url: Some(format!("{base}/grade")),
            request_timeout_secs: 1,
            ..Default::default()
        };
        let scorer = Arc::new(HttpCallScorer::from_settings(&settings).unwrap());
        let store = Arc::new(InMemoryCallStore::new());
        let processor = BatchProcessor::new(scorer, store)
            .with_score_timeout(WorkerConfig::default().score_timeout());

        let item = WorkItem {
            id: "c1".into(),
            transcript: "hello there".into(),
            duration_secs: 300,
            segment_count: 5,
            company_name: Some("Acme".into()),
            contact_name: None,
        };
        let outcome = processor.process_batch(&[item], false, None).await;
        assert_eq!(outcome.success_count, 1, "{:?}", outcome.results);
        assert_eq!(outcome.results[0].score, Some(7.0));
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpCallScorer::new(
            &format!("http://{addr}/grade"),
            None,
            Duration::from_secs(2),
        )
        .unwrap()
        .score(&request())
        .await
        .unwrap_err();
        assert!(matches!(err, TaskError::Retryable(_)));
    }
}
