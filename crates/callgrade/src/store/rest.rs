//! REST store backend for a PostgREST-style database service.
//!
//! Endpoints (relative to the store base URL):
//! - `POST rest/v1/rpc/get_calls_with_filters` - paginated candidates
//! - `GET  rest/v1/call_analyses?select=call_id` - completed analyses
//! - `PATCH rest/v1/calls?id=eq.{id}` - analysis status write-back
//! - `GET/POST rest/v1/system_config` - key/value config

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use super::{
    CallStore, CandidateFilter, CandidatePage, ConfigStore, StoreError, StoreResult,
};
use crate::config::Settings;
use crate::models::{AnalysisStatus, CallRow};

const CANDIDATES_RPC: &str = "rest/v1/rpc/get_calls_with_filters";
const ANALYSES_TABLE: &str = "rest/v1/call_analyses";
const CALLS_TABLE: &str = "rest/v1/calls";
const CONFIG_TABLE: &str = "rest/v1/system_config";

/// Candidate row as returned by the RPC: the call columns plus the window total.
#[derive(Debug, Deserialize)]
struct RpcRow {
    #[serde(flatten)]
    row: CallRow,
    #[serde(default)]
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AnalyzedRow {
    call_id: String,
}

#[derive(Debug, Deserialize)]
struct ConfigRow {
    value: serde_json::Value,
}

/// Store client over HTTP.
#[derive(Clone)]
pub struct RestCallStore {
    client: Client,
    base_url: Url,
}

impl RestCallStore {
    /// Create a client for `base_url`, authenticating with `api_key` when given.
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> StoreResult<Self> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| StoreError::Config(format!("invalid store URL '{}': {}", base_url, e)))?;

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let apikey = HeaderValue::from_str(key)
                .map_err(|e| StoreError::Config(format!("invalid API key: {}", e)))?;
            let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| StoreError::Config(format!("invalid API key: {}", e)))?;
            headers.insert("apikey", apikey);
            headers.insert(AUTHORIZATION, bearer);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn from_settings(settings: &Settings) -> StoreResult<Self> {
        let url = settings
            .store_url
            .as_deref()
            .ok_or_else(|| StoreError::Config("store URL is not configured".into()))?;
        Self::new(
            url,
            settings.store_api_key.as_deref(),
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> StoreResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| StoreError::Config(format!("invalid endpoint '{}': {}", path, e)))
    }
}

/// Turn a non-success response into `StoreError::Status`.
async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        code: status.as_u16(),
        body,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> StoreResult<T> {
    let bytes = check_status(response).await?.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl CallStore for RestCallStore {
    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
        limit: usize,
        offset: usize,
    ) -> StoreResult<CandidatePage> {
        debug!(limit, offset, "listing candidate calls");
        let response = self
            .client
            .post(self.endpoint(CANDIDATES_RPC)?)
            .json(&json!({
                "filters": filter,
                "p_limit": limit,
                "p_offset": offset,
            }))
            .send()
            .await?;

        let rows: Vec<RpcRow> = decode(response).await?;
        let total_count = rows.first().and_then(|r| r.total_count);

        Ok(CandidatePage {
            rows: rows.into_iter().map(|r| r.row).collect(),
            total_count,
        })
    }

    async fn list_analyzed_ids(&self) -> StoreResult<Vec<String>> {
        let response = self
            .client
            .get(self.endpoint(ANALYSES_TABLE)?)
            .query(&[("select", "call_id")])
            .send()
            .await?;

        let rows: Vec<AnalyzedRow> = decode(response).await?;
        Ok(rows.into_iter().map(|r| r.call_id).collect())
    }

    async fn update_status(&self, call_id: &str, status: AnalysisStatus) -> StoreResult<()> {
        let response = self
            .client
            .patch(self.endpoint(CALLS_TABLE)?)
            .query(&[("id", format!("eq.{}", call_id))])
            .json(&json!({ "analysis_status": status.as_str() }))
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for RestCallStore {
    async fn get_value(&self, key: &str) -> StoreResult<Option<serde_json::Value>> {
        let response = self
            .client
            .get(self.endpoint(CONFIG_TABLE)?)
            .query(&[("key", format!("eq.{}", key)), ("select", "value".to_string())])
            .send()
            .await?;

        let rows: Vec<ConfigRow> = decode(response).await?;
        Ok(rows.into_iter().next().map(|r| r.value))
    }

    async fn set_value(&self, key: &str, value: serde_json::Value) -> StoreResult<()> {
        let response = self
            .client
            .post(self.endpoint(CONFIG_TABLE)?)
            .header("Prefer", "resolution=merge-duplicates")
            .json(&json!({ "key": key, "value": value }))
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}
