//! In-memory store backend for tests and offline runs.
//!
//! State is not persisted across restarts.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{
    CallStore, CandidateFilter, CandidatePage, ConfigStore, StoreError, StoreResult,
};
use crate::models::{AnalysisStatus, CallRow};

/// Serialized form of an in-memory store, loadable from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub calls: Vec<CallRow>,
    /// Call ids that already have a completed analysis.
    #[serde(default)]
    pub analyzed: Vec<String>,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<CallRow>,
    analyzed: HashSet<String>,
    statuses: HashMap<String, AnalysisStatus>,
    config: HashMap<String, serde_json::Value>,
}

/// In-memory store backend.
#[derive(Clone, Default)]
pub struct InMemoryCallStore {
    state: Arc<RwLock<State>>,
    unavailable: Arc<AtomicBool>,
    fail_status_writes: Arc<AtomicBool>,
    list_calls: Arc<AtomicUsize>,
}

impl InMemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calls(calls: Vec<CallRow>) -> Self {
        Self::from_fixture(Fixture {
            calls,
            ..Default::default()
        })
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let state = State {
            calls: fixture.calls,
            analyzed: fixture.analyzed.into_iter().collect(),
            statuses: HashMap::new(),
            config: fixture.config,
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            ..Default::default()
        }
    }

    /// Load a fixture from a JSON file.
    pub fn load(path: &Path) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("failed to read fixture '{}': {}", path.display(), e))
        })?;
        let fixture: Fixture = serde_json::from_str(&raw)?;
        Ok(Self::from_fixture(fixture))
    }

    /// Current state in fixture form. Status history is not included.
    pub async fn snapshot(&self) -> Fixture {
        let state = self.state.read().await;
        let mut analyzed: Vec<String> = state.analyzed.iter().cloned().collect();
        analyzed.sort();
        Fixture {
            calls: state.calls.clone(),
            analyzed,
            config: state.config.clone(),
        }
    }

    /// Write the current state back to a JSON fixture file.
    pub async fn save(&self, path: &Path) -> StoreResult<()> {
        let raw = serde_json::to_string_pretty(&self.snapshot().await)?;
        std::fs::write(path, raw).map_err(|e| {
            StoreError::Config(format!("failed to write fixture '{}': {}", path.display(), e))
        })
    }

    pub async fn mark_analyzed(&self, call_id: &str) {
        self.state.write().await.analyzed.insert(call_id.to_string());
    }

    /// Last status written for a call, if any.
    pub async fn status_of(&self, call_id: &str) -> Option<AnalysisStatus> {
        self.state.read().await.statuses.get(call_id).copied()
    }

    pub async fn statuses(&self) -> HashMap<String, AnalysisStatus> {
        self.state.read().await.statuses.clone()
    }

    /// Make every operation fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make status write-backs fail while other operations keep working.
    pub fn set_fail_status_writes(&self, fail: bool) {
        self.fail_status_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `list_candidates` calls served so far.
    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store disabled".into()));
        }
        Ok(())
    }
}

fn matches_filter(row: &CallRow, filter: &CandidateFilter) -> bool {
    if filter.has_transcript && row.transcript_text().trim().is_empty() {
        return false;
    }
    if let Some(min) = filter.min_duration_secs {
        if row.duration_secs() <= min {
            return false;
        }
    }
    true
}

#[async_trait]
impl CallStore for InMemoryCallStore {
    async fn list_candidates(
        &self,
        filter: &CandidateFilter,
        limit: usize,
        offset: usize,
    ) -> StoreResult<CandidatePage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let state = self.state.read().await;
        let matching: Vec<&CallRow> = state
            .calls
            .iter()
            .filter(|row| matches_filter(row, filter))
            .collect();

        Ok(CandidatePage {
            total_count: Some(matching.len() as u64),
            rows: matching
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
        })
    }

    async fn list_analyzed_ids(&self) -> StoreResult<Vec<String>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut ids: Vec<String> = state.analyzed.iter().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn update_status(&self, call_id: &str, status: AnalysisStatus) -> StoreResult<()> {
        self.check_available()?;
        if self.fail_status_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                code: 500,
                body: "status write rejected".into(),
            });
        }

        let mut state = self.state.write().await;
        state.statuses.insert(call_id.to_string(), status);
        if status == AnalysisStatus::Completed {
            state.analyzed.insert(call_id.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for InMemoryCallStore {
    async fn get_value(&self, key: &str) -> StoreResult<Option<serde_json::Value>> {
        self.check_available()?;
        Ok(self.state.read().await.config.get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: serde_json::Value) -> StoreResult<()> {
        self.check_available()?;
        self.state
            .write()
            .await
            .config
            .insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, transcript: &str, secs: f64) -> CallRow {
        CallRow {
            id: id.into(),
            transcript: Some(transcript.into()),
            duration_seconds: Some(secs),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_pagination_is_stable() {
        let store = InMemoryCallStore::with_calls(
            (0..5).map(|i| row(&format!("c{i}"), "text", 200.0)).collect(),
        );
        let filter = CandidateFilter::default();

        let first = store.list_candidates(&filter, 2, 0).await.unwrap();
        let second = store.list_candidates(&filter, 2, 2).await.unwrap();
        let third = store.list_candidates(&filter, 2, 4).await.unwrap();
        let past_end = store.list_candidates(&filter, 2, 6).await.unwrap();

        let ids: Vec<_> = [first.rows, second.rows, third.rows]
            .concat()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["c0", "c1", "c2", "c3", "c4"]);
        assert!(past_end.rows.is_empty());
        assert_eq!(past_end.total_count, Some(5));
        assert_eq!(store.list_call_count(), 4);
    }

    #[tokio::test]
    async fn test_filter_prefilters_rows() {
        let store = InMemoryCallStore::with_calls(vec![
            row("a", "hello", 300.0),
            row("b", "", 300.0),
            row("c", "hello", 60.0),
        ]);
        let filter = CandidateFilter {
            has_transcript: true,
            min_duration_secs: Some(180),
        };
        let page = store.list_candidates(&filter, 10, 0).await.unwrap();
        assert_eq!(page.total_count, Some(1));
        assert_eq!(page.rows[0].id, "a");
    }

    #[tokio::test]
    async fn test_completed_status_marks_analyzed() {
        let store = InMemoryCallStore::with_calls(vec![row("a", "x", 300.0)]);
        store
            .update_status("a", AnalysisStatus::Completed)
            .await
            .unwrap();
        store.update_status("b", AnalysisStatus::Failed).await.unwrap();

        assert_eq!(store.status_of("a").await, Some(AnalysisStatus::Completed));
        assert_eq!(store.status_of("b").await, Some(AnalysisStatus::Failed));
        assert_eq!(store.list_analyzed_ids().await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_operation() {
        let store = InMemoryCallStore::new();
        store.set_unavailable(true);
        assert!(store
            .list_candidates(&CandidateFilter::default(), 10, 0)
            .await
            .is_err());
        assert!(store.list_analyzed_ids().await.is_err());
        assert!(store.get_value("k").await.is_err());
    }

    #[tokio::test]
    async fn test_fixture_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.json");
        std::fs::write(
            &path,
            r#"{"calls":[{"id":"a","transcript":"hi","duration":"00:04:00"}],
                "analyzed":["z"],
                "config":{"analysis_worker_enabled":"true"}}"#,
        )
        .unwrap();

        let store = InMemoryCallStore::load(&path).unwrap();
        let page = store
            .list_candidates(&CandidateFilter::default(), 10, 0)
            .await
            .unwrap();
        assert_eq!(page.rows[0].duration_secs(), 240);
        assert_eq!(store.list_analyzed_ids().await.unwrap(), vec!["z"]);
        assert_eq!(
            store.get_value("analysis_worker_enabled").await.unwrap(),
            Some(serde_json::json!("true"))
        );
    }

    #[tokio::test]
    async fn test_save_keeps_config_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.json");
        let store = InMemoryCallStore::with_calls(vec![row("a", "hello", 300.0)]);
        store.mark_analyzed("a").await;
        store
            .set_value("analysis_worker_enabled", serde_json::json!(true))
            .await
            .unwrap();
        store.save(&path).await.unwrap();

        let reloaded = InMemoryCallStore::load(&path).unwrap();
        assert_eq!(
            reloaded.get_value("analysis_worker_enabled").await.unwrap(),
            Some(serde_json::json!(true))
        );
        assert_eq!(reloaded.list_analyzed_ids().await.unwrap(), vec!["a"]);
        assert_eq!(reloaded.snapshot().await.calls.len(), 1);
    }
}
