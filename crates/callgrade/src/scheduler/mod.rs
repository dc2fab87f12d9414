//! Background analysis scheduler.
//!
//! Owns the repeating timer, the single-flight guard and run statistics. Each
//! cycle resolves eligible calls, re-checks their transcript quality, scores a
//! batch and folds the outcome into [`RunStats`]. Cycle errors are logged and
//! recorded; they never stop the timer.

mod clock;
mod timer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use timer::{ManualTimer, TickFn, Timer, TimerHandle, TokioTimer};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify, RwLock};
use tracing::{debug, error, info, warn};

use crate::batch::{BatchEvent, BatchOutcome, BatchProcessor};
use crate::cancel::CancelSource;
use crate::config::{
    load_enabled_flag, persist_enabled_flag, persist_worker_config, WorkerConfig,
    WorkerConfigPatch,
};
use crate::eligibility::{EligibilityCriteria, EligibilityResolver};
use crate::models::{RunStats, WorkItem};
use crate::quality;
use crate::retry::RetryPolicy;
use crate::scoring::CallScorer;
use crate::store::{CallStore, ConfigStore};

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub force_reprocess: bool,
    /// Calls returned by the eligibility resolver.
    pub candidates: usize,
    /// Candidates dropped by the transcript quality re-check.
    pub rejected_by_quality: usize,
    /// Batch outcome; `None` when the cycle failed before scoring.
    pub outcome: Option<BatchOutcome>,
    pub error: Option<String>,
}

impl CycleReport {
    pub fn processed(&self) -> usize {
        self.outcome.as_ref().map_or(0, BatchOutcome::processed)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Snapshot returned by [`AnalysisScheduler::get_stats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStats {
    #[serde(flatten)]
    pub stats: RunStats,
    /// A timer is armed.
    pub is_running: bool,
    /// A cycle is executing right now.
    pub is_processing: bool,
    pub cycles_completed: u64,
    pub config: WorkerConfig,
    pub last_cycle: Option<CycleReport>,
}

struct Inner {
    store: Arc<dyn CallStore>,
    config_store: Arc<dyn ConfigStore>,
    scorer: Arc<dyn CallScorer>,
    timer: Arc<dyn Timer>,
    clock: Arc<dyn Clock>,
    dev_mode: bool,
    config: RwLock<WorkerConfig>,
    stats: RwLock<RunStats>,
    last_cycle: RwLock<Option<CycleReport>>,
    processing: AtomicBool,
    cycles: AtomicU64,
    idle: Notify,
    timer_handle: Mutex<Option<TimerHandle>>,
    cancel: CancelSource,
}

/// Builder for [`AnalysisScheduler`].
pub struct SchedulerBuilder {
    store: Arc<dyn CallStore>,
    config_store: Arc<dyn ConfigStore>,
    scorer: Arc<dyn CallScorer>,
    timer: Arc<dyn Timer>,
    clock: Arc<dyn Clock>,
    config: WorkerConfig,
    dev_mode: bool,
}

impl SchedulerBuilder {
    pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Local development mode: `start()` ignores the stored enabled flag.
    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    pub fn build(self) -> AnalysisScheduler {
        AnalysisScheduler {
            inner: Arc::new(Inner {
                store: self.store,
                config_store: self.config_store,
                scorer: self.scorer,
                timer: self.timer,
                clock: self.clock,
                dev_mode: self.dev_mode,
                config: RwLock::new(self.config),
                stats: RwLock::new(RunStats::default()),
                last_cycle: RwLock::new(None),
                processing: AtomicBool::new(false),
                cycles: AtomicU64::new(0),
                idle: Notify::new(),
                timer_handle: Mutex::new(None),
                cancel: CancelSource::new(),
            }),
        }
    }
}

/// Periodic scoring worker. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AnalysisScheduler {
    inner: Arc<Inner>,
}

impl AnalysisScheduler {
    pub fn builder(
        store: Arc<dyn CallStore>,
        config_store: Arc<dyn ConfigStore>,
        scorer: Arc<dyn CallScorer>,
    ) -> SchedulerBuilder {
        SchedulerBuilder {
            store,
            config_store,
            scorer,
            timer: Arc::new(TokioTimer),
            clock: Arc::new(SystemClock),
            config: WorkerConfig::default(),
            dev_mode: false,
        }
    }

    /// Arm the timer and trigger an immediate cycle.
    ///
    /// No-op when already running. Reads the enabled flag from the config
    /// store (dev mode force-enables) and stays idle when disabled.
    /// Returns whether a timer was armed by this call.
    pub async fn start(&self) -> bool {
        if self.is_running() {
            debug!("analysis worker already running");
            return false;
        }

        let enabled =
            self.inner.dev_mode || load_enabled_flag(self.inner.config_store.as_ref()).await;
        if !enabled {
            info!("analysis worker disabled, not starting");
            return false;
        }

        let interval = {
            let mut config = self.inner.config.write().await;
            config.enabled = true;
            config.interval()
        };

        {
            let mut handle = self.handle();
            if handle.is_some() {
                return false;
            }
            self.inner.cancel.reset();
            *handle = Some(self.arm(interval));
        }

        info!(
            interval_secs = interval.as_secs(),
            dev_mode = self.inner.dev_mode,
            "analysis worker started"
        );
        spawn_tick(&self.inner);
        true
    }

    /// Disarm the timer. A cycle in progress runs to completion.
    pub fn stop(&self) -> bool {
        match self.handle().take() {
            Some(handle) => {
                handle.cancel();
                info!("analysis worker stopped");
                true
            }
            None => false,
        }
    }

    /// Stop, cancel the in-flight cycle between items, and wait for it to end.
    ///
    /// Cancellation only applies to that cycle.
    pub async fn shutdown(&self) {
        self.stop();
        self.inner.cancel.cancel();

        loop {
            let idle = self.inner.idle.notified();
            if !self.inner.processing.load(Ordering::SeqCst) {
                break;
            }
            debug!("waiting for in-flight cycle to finish");
            idle.await;
        }
        // later manual runs start uncancelled
        self.inner.cancel.reset();
        info!("analysis worker shut down");
    }

    pub fn is_running(&self) -> bool {
        self.handle().is_some()
    }

    pub fn is_processing(&self) -> bool {
        self.inner.processing.load(Ordering::SeqCst)
    }

    pub async fn get_stats(&self) -> WorkerStats {
        WorkerStats {
            stats: self.inner.stats.read().await.clone(),
            is_running: self.is_running(),
            is_processing: self.is_processing(),
            cycles_completed: self.inner.cycles.load(Ordering::SeqCst),
            config: self.inner.config.read().await.clone(),
            last_cycle: self.inner.last_cycle.read().await.clone(),
        }
    }

    pub async fn config(&self) -> WorkerConfig {
        self.inner.config.read().await.clone()
    }

    /// Merge `patch` into the active config and persist it (best-effort).
    ///
    /// A cycle already running keeps the config it started with. A changed
    /// interval re-arms a running timer.
    pub async fn update_config(&self, patch: &WorkerConfigPatch) -> WorkerConfig {
        let (merged, interval_changed) = {
            let mut config = self.inner.config.write().await;
            let old_interval = config.interval_secs;
            config.merge(patch);
            (config.clone(), config.interval_secs != old_interval)
        };
        info!(?patch, "analysis worker config updated");

        if interval_changed {
            let mut handle = self.handle();
            if let Some(old) = handle.take() {
                old.cancel();
                *handle = Some(self.arm(merged.interval()));
                debug!(interval_secs = merged.interval_secs, "timer re-armed");
            }
        }

        let store = self.inner.config_store.as_ref();
        if let Err(e) = persist_worker_config(store, &merged).await {
            warn!(error = %e, "failed to persist worker config");
        }
        if let Some(enabled) = patch.enabled {
            if let Err(e) = persist_enabled_flag(store, enabled).await {
                warn!(error = %e, "failed to persist enabled flag");
            }
        }

        merged
    }

    /// Run one cycle now, outside the timer.
    ///
    /// `limit` overrides the batch size. Returns `None` when a cycle is
    /// already in progress.
    pub async fn run_once(
        &self,
        force_reprocess: bool,
        limit: Option<usize>,
        events: Option<mpsc::Sender<BatchEvent>>,
    ) -> Option<CycleReport> {
        run_guarded(&self.inner, force_reprocess, limit, events.as_ref()).await
    }

    fn arm(&self, interval: std::time::Duration) -> TimerHandle {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let tick: TickFn = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                spawn_tick(&inner);
            }
        });
        self.inner.timer.schedule_repeating(interval, tick)
    }

    fn handle(&self) -> MutexGuard<'_, Option<TimerHandle>> {
        self.inner
            .timer_handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Detach one timer-driven cycle.
fn spawn_tick(inner: &Arc<Inner>) {
    let inner = inner.clone();
    tokio::spawn(async move {
        if run_guarded(&inner, false, None, None).await.is_none() {
            debug!("cycle already in progress, tick skipped");
        }
    });
}

/// Clears the processing flag and wakes `shutdown` waiters, even on panic.
struct ProcessingGuard<'a>(&'a Inner);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.processing.store(false, Ordering::SeqCst);
        self.0.idle.notify_waiters();
    }
}

async fn run_guarded(
    inner: &Inner,
    force_reprocess: bool,
    limit: Option<usize>,
    events: Option<&mpsc::Sender<BatchEvent>>,
) -> Option<CycleReport> {
    if inner
        .processing
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return None;
    }
    let _guard = ProcessingGuard(inner);

    let report = run_cycle(inner, force_reprocess, limit, events).await;

    inner.stats.write().await.record_cycle(
        report.processed(),
        report.outcome.as_ref().map_or(0, |o| o.success_count),
        report.outcome.as_ref().map_or(0, |o| o.failure_count),
        report.finished_at,
    );
    *inner.last_cycle.write().await = Some(report.clone());
    inner.cycles.fetch_add(1, Ordering::SeqCst);

    Some(report)
}

async fn run_cycle(
    inner: &Inner,
    force_reprocess: bool,
    limit: Option<usize>,
    events: Option<&mpsc::Sender<BatchEvent>>,
) -> CycleReport {
    let config = inner.config.read().await.clone();
    let batch_size = limit.unwrap_or(config.batch_size);
    let started_at = inner.clock.now();
    debug!(batch_size, force_reprocess, "analysis cycle started");

    let mut report = CycleReport {
        started_at,
        finished_at: started_at,
        force_reprocess,
        candidates: 0,
        rejected_by_quality: 0,
        outcome: None,
        error: None,
    };

    let resolver = EligibilityResolver::new(
        inner.store.clone(),
        EligibilityCriteria::default().with_min_duration(config.min_duration_secs),
    );

    let candidates = match resolver
        .list_eligible(force_reprocess, batch_size.saturating_mul(2))
        .await
    {
        Ok(candidates) => candidates,
        Err(e) => {
            error!(error = %e, "analysis cycle failed");
            report.error = Some(e.to_string());
            report.finished_at = inner.clock.now();
            return report;
        }
    };
    report.candidates = candidates.len();

    let (batch, rejected) = quality_pass(candidates, batch_size);
    report.rejected_by_quality = rejected;

    if batch.is_empty() {
        info!(
            candidates = report.candidates,
            rejected, "no calls to analyze this cycle"
        );
        report.outcome = Some(BatchOutcome::default());
        report.finished_at = inner.clock.now();
        return report;
    }

    let processor = BatchProcessor::new(inner.scorer.clone(), inner.store.clone())
        .with_policy(RetryPolicy::analysis().with_max_attempts(config.max_retries))
        .with_score_timeout(config.score_timeout())
        .with_cancel(inner.cancel.token());

    let outcome = processor
        .process_batch(&batch, force_reprocess, events)
        .await;

    info!(
        processed = outcome.processed(),
        succeeded = outcome.success_count,
        failed = outcome.failure_count,
        rejected,
        "analysis cycle complete"
    );

    report.outcome = Some(outcome);
    report.finished_at = inner.clock.now();
    report
}

/// Drop candidates whose transcript fails the quality check; keep `batch_size`.
fn quality_pass(candidates: Vec<WorkItem>, batch_size: usize) -> (Vec<WorkItem>, usize) {
    let mut rejected = 0;
    let mut batch = Vec::with_capacity(batch_size);

    for item in candidates {
        if batch.len() >= batch_size {
            break;
        }
        let decision = quality::should_analyze(&item.transcript);
        if decision.allow {
            batch.push(item);
        } else {
            info!(call_id = %item.id, reason = %decision.reason, "skipping low-quality transcript");
            rejected += 1;
        }
    }

    (batch, rejected)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::config::{WORKER_CONFIG_KEY, WORKER_ENABLED_KEY};
    use crate::models::{AnalysisStatus, CallRow};
    use crate::retry::TaskError;
    use crate::scoring::{ScoreRequest, ScoreResult};
    use crate::store::InMemoryCallStore;

    const GOOD: &str = "Hello, this is Anna from Acme Software. Do you have a minute to talk about your project? \
        Yes, I have some time right now. Great, we would like to offer a discount on the subscription. \
        Okay, please send me the quote by email. Thank you, talk to you soon.";

    /// Scorer that optionally waits for a permit before answering.
    #[derive(Default)]
    struct GatedScorer {
        gate: Option<Arc<Semaphore>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CallScorer for GatedScorer {
        async fn score(&self, _request: &ScoreRequest) -> Result<ScoreResult, TaskError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .map_err(|e| TaskError::Fatal(e.to_string()))?
                    .forget();
            }
            Ok(ScoreResult {
                final_grade: Some(7.0),
                scorecard_used: None,
            })
        }
    }

    fn call(id: &str, transcript: &str) -> CallRow {
        CallRow {
            id: id.into(),
            transcript: Some(transcript.into()),
            duration: Some("00:05:00".into()),
            company_name: Some(format!("Company {id}")),
            ..Default::default()
        }
    }

    struct Harness {
        store: InMemoryCallStore,
        scorer: Arc<GatedScorer>,
        timer: ManualTimer,
        scheduler: AnalysisScheduler,
    }

    fn harness(calls: Vec<CallRow>, scorer: GatedScorer, dev_mode: bool) -> Harness {
        let store = InMemoryCallStore::with_calls(calls);
        let scorer = Arc::new(scorer);
        let timer = ManualTimer::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap());
        let scheduler = AnalysisScheduler::builder(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            scorer.clone(),
        )
        .timer(Arc::new(timer.clone()))
        .clock(Arc::new(clock))
        .dev_mode(dev_mode)
        .build();
        Harness {
            store,
            scorer,
            timer,
            scheduler,
        }
    }

    async fn wait_for_cycles(scheduler: &AnalysisScheduler, n: u64) {
        for _ in 0..1000 {
            if scheduler.get_stats().await.cycles_completed >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {n} completed cycles");
    }

    async fn enable(store: &InMemoryCallStore) {
        store.set_value(WORKER_ENABLED_KEY, json!("true")).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_arms_one_timer() {
        let h = harness(vec![call("a", GOOD)], GatedScorer::default(), false);
        enable(&h.store).await;

        assert!(h.scheduler.start().await);
        assert!(h.scheduler.get_stats().await.is_running);
        assert!(!h.scheduler.start().await);

        assert_eq!(h.timer.active_count(), 1);
        assert!(h.scheduler.get_stats().await.is_running);
        assert_eq!(h.timer.active_periods(), vec![Duration::from_secs(300)]);

        // immediate first cycle
        wait_for_cycles(&h.scheduler, 1).await;
        let stats = h.scheduler.get_stats().await;
        assert_eq!(stats.stats.total_processed, 1);
        assert_eq!(stats.stats.successful, 1);
        assert_eq!(
            stats.stats.last_run,
            Some(Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap())
        );
        assert_eq!(h.store.status_of("a").await, Some(AnalysisStatus::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_worker_does_not_start() {
        let h = harness(vec![call("a", GOOD)], GatedScorer::default(), false);
        h.store
            .set_value(WORKER_ENABLED_KEY, json!("no"))
            .await
            .unwrap();

        assert!(!h.scheduler.start().await);
        assert!(!h.scheduler.is_running());
        assert_eq!(h.timer.active_count(), 0);

        h.store.set_unavailable(true);
        assert!(!h.scheduler.start().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dev_mode_forces_start() {
        let h = harness(vec![], GatedScorer::default(), true);
        assert!(h.scheduler.start().await);
        assert!(h.scheduler.get_stats().await.config.enabled);
        wait_for_cycles(&h.scheduler, 1).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_never_overlap() {
        let gate = Arc::new(Semaphore::new(0));
        let h = harness(
            vec![call("a", GOOD)],
            GatedScorer {
                gate: Some(gate.clone()),
                ..Default::default()
            },
            true,
        );

        h.scheduler.start().await;
        while h.scorer.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(h.scheduler.is_processing());

        // ticks and manual runs during a cycle are skipped
        h.timer.fire();
        h.timer.fire();
        assert!(h.scheduler.run_once(false, None, None).await.is_none());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.scorer.calls.load(Ordering::SeqCst), 1);

        gate.add_permits(1);
        wait_for_cycles(&h.scheduler, 1).await;
        assert!(!h.scheduler.is_processing());
        assert_eq!(h.scheduler.get_stats().await.cycles_completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_error_keeps_timer() {
        let h = harness(vec![call("a", GOOD)], GatedScorer::default(), true);
        h.store.set_unavailable(true);

        h.scheduler.start().await;
        wait_for_cycles(&h.scheduler, 1).await;

        let stats = h.scheduler.get_stats().await;
        assert!(stats.is_running);
        assert_eq!(stats.stats.total_processed, 0);
        assert!(stats.stats.last_run.is_some());
        assert!(stats.last_cycle.as_ref().is_some_and(CycleReport::is_error));

        h.store.set_unavailable(false);
        h.timer.fire();
        wait_for_cycles(&h.scheduler, 2).await;
        let stats = h.scheduler.get_stats().await;
        assert_eq!(stats.stats.successful, 1);
        assert!(!stats.last_cycle.as_ref().is_some_and(CycleReport::is_error));
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_quality_candidates_are_dropped() {
        // eligible (long enough, 3+ segments) but no dialog markers
        let flat = "Quarterly figures were reviewed line by line. Totals matched the ledger exactly. \
            Remaining items were deferred to the following quarter for review.";
        let h = harness(
            vec![call("flat", flat), call("good", GOOD)],
            GatedScorer::default(),
            false,
        );

        let report = h.scheduler.run_once(false, None, None).await.unwrap();
        assert_eq!(report.candidates, 2);
        assert_eq!(report.rejected_by_quality, 1);
        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].call_id, "good");
        assert_eq!(h.store.status_of("flat").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_respects_limit_and_force() {
        let calls = (0..6).map(|i| call(&format!("c{i}"), GOOD)).collect();
        let h = harness(calls, GatedScorer::default(), false);
        h.store.mark_analyzed("c0").await;

        let report = h.scheduler.run_once(false, Some(2), None).await.unwrap();
        let ids: Vec<_> = report
            .outcome
            .unwrap()
            .results
            .into_iter()
            .map(|r| r.call_id)
            .collect();
        assert_eq!(ids, vec!["c1", "c2"]);

        let forced = h.scheduler.run_once(true, Some(1), None).await.unwrap();
        assert_eq!(forced.outcome.unwrap().results[0].call_id, "c0");

        let stats = h.scheduler.get_stats().await;
        assert_eq!(stats.stats.total_processed, 3);
        assert_eq!(stats.cycles_completed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_cycle_finish() {
        let gate = Arc::new(Semaphore::new(0));
        let h = harness(
            vec![call("a", GOOD)],
            GatedScorer {
                gate: Some(gate.clone()),
                ..Default::default()
            },
            true,
        );
        h.scheduler.start().await;
        while h.scorer.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(h.scheduler.stop());
        assert!(!h.scheduler.stop());
        assert_eq!(h.timer.active_count(), 0);
        assert!(h.scheduler.is_processing());

        gate.add_permits(1);
        wait_for_cycles(&h.scheduler, 1).await;
        assert_eq!(h.scheduler.get_stats().await.stats.successful, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_remaining_work() {
        let gate = Arc::new(Semaphore::new(0));
        let h = harness(
            vec![call("a", GOOD)],
            GatedScorer {
                gate: Some(gate.clone()),
                ..Default::default()
            },
            true,
        );
        h.scheduler.start().await;
        while h.scorer.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let scheduler = h.scheduler.clone();
        let shutdown = tokio::spawn(async move { scheduler.shutdown().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!shutdown.is_finished());

        gate.add_permits(1);
        shutdown.await.unwrap();
        assert!(!h.scheduler.is_running());
        assert!(!h.scheduler.is_processing());

        gate.add_permits(1);
        let report = h.scheduler.run_once(true, None, None).await.unwrap();
        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.cancelled_count, 0);

        let stats = h.scheduler.get_stats().await;
        assert_eq!(stats.stats.successful, 2);
        assert_eq!(stats.stats.failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_config_leaves_running_cycle_alone() {
        let gate = Arc::new(Semaphore::new(0));
        let h = harness(
            vec![call("a", GOOD), call("b", GOOD), call("c", GOOD)],
            GatedScorer {
                gate: Some(gate.clone()),
                ..Default::default()
            },
            true,
        );
        h.scheduler.start().await;
        while h.scorer.calls.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        h.scheduler
            .update_config(&WorkerConfigPatch {
                batch_size: Some(1),
                max_retries: Some(5),
                ..Default::default()
            })
            .await;
        gate.add_permits(3);
        wait_for_cycles(&h.scheduler, 1).await;

        let stats = h.scheduler.get_stats().await;
        let first = stats.last_cycle.unwrap().outcome.unwrap();
        assert_eq!(first.success_count, 3);
        assert_eq!(stats.config.batch_size, 1);
        assert_eq!(stats.config.max_retries, 5);

        // the patched batch size applies from the next cycle
        gate.add_permits(3);
        let report = h.scheduler.run_once(true, None, None).await.unwrap();
        assert_eq!(report.processed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_config_merges_persists_and_rearms() {
        let h = harness(vec![], GatedScorer::default(), true);
        h.scheduler.start().await;

        let merged = h
            .scheduler
            .update_config(&WorkerConfigPatch {
                interval_secs: Some(60),
                batch_size: Some(2),
                ..Default::default()
            })
            .await;
        assert_eq!(merged.batch_size, 2);
        assert_eq!(merged.min_duration_secs, 180);
        assert_eq!(h.timer.active_periods(), vec![Duration::from_secs(60)]);
        assert_eq!(h.scheduler.config().await, merged);

        let stored = h.store.get_value(WORKER_CONFIG_KEY).await.unwrap().unwrap();
        assert_eq!(stored["batch_size"], json!(2));
        assert_eq!(h.store.get_value(WORKER_ENABLED_KEY).await.unwrap(), None);

        // persistence failures do not undo the in-memory update
        h.store.set_unavailable(true);
        let merged = h
            .scheduler
            .update_config(&WorkerConfigPatch {
                enabled: Some(false),
                ..Default::default()
            })
            .await;
        assert!(!merged.enabled);
        assert!(!h.scheduler.config().await.enabled);
    }

    #[test]
    fn test_quality_pass_keeps_batch_size() {
        let item = |id: &str, transcript: &str| WorkItem {
            id: id.into(),
            transcript: transcript.into(),
            duration_secs: 300,
            segment_count: 6,
            company_name: None,
            contact_name: None,
        };
        let candidates = vec![
            item("a", GOOD),
            item("b", "Too short."),
            item("c", GOOD),
            item("d", GOOD),
        ];
        let (batch, rejected) = quality_pass(candidates, 2);
        let ids: Vec<_> = batch.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(rejected, 1);
    }
}
