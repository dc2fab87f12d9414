//! Repeating timers behind a trait so tests can fire ticks by hand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::MissedTickBehavior;

/// Callback invoked on every tick. Must not block.
pub type TickFn = Arc<dyn Fn() + Send + Sync>;

/// Schedules repeating callbacks.
pub trait Timer: Send + Sync {
    /// Call `tick` every `period`, starting one period from now.
    fn schedule_repeating(&self, period: Duration, tick: TickFn) -> TimerHandle;
}

/// Handle to a scheduled timer. Dropping it leaves the timer running.
pub struct TimerHandle {
    cancel: Box<dyn FnOnce() + Send>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    /// Stop future ticks. A tick already running is not interrupted.
    pub fn cancel(self) {
        (self.cancel)();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle").finish_non_exhaustive()
    }
}

/// Timer backed by `tokio::time::interval`. Missed ticks are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn schedule_repeating(&self, period: Duration, tick: TickFn) -> TimerHandle {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                tick();
            }
        });
        TimerHandle::new(move || task.abort())
    }
}

struct Registration {
    period: Duration,
    tick: TickFn,
    active: Arc<AtomicBool>,
}

/// Timer whose ticks are fired explicitly. For tests.
#[derive(Clone, Default)]
pub struct ManualTimer {
    registrations: Arc<Mutex<Vec<Registration>>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every active registration once. Returns how many fired.
    pub fn fire(&self) -> usize {
        let ticks: Vec<TickFn> = self
            .lock()
            .iter()
            .filter(|r| r.active.load(Ordering::SeqCst))
            .map(|r| r.tick.clone())
            .collect();
        for tick in &ticks {
            tick();
        }
        ticks.len()
    }

    /// Number of timers scheduled and not cancelled.
    pub fn active_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|r| r.active.load(Ordering::SeqCst))
            .count()
    }

    /// Periods of active timers, in scheduling order.
    pub fn active_periods(&self) -> Vec<Duration> {
        self.lock()
            .iter()
            .filter(|r| r.active.load(Ordering::SeqCst))
            .map(|r| r.period)
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Timer for ManualTimer {
    fn schedule_repeating(&self, period: Duration, tick: TickFn) -> TimerHandle {
        let active = Arc::new(AtomicBool::new(true));
        self.lock().push(Registration {
            period,
            tick,
            active: active.clone(),
        });
        TimerHandle::new(move || active.store(false, Ordering::SeqCst))
    }
}
