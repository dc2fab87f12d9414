//! Run statistics accumulated across scheduler cycles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters updated by the scheduler after each cycle.
///
/// Never reset while the process lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub last_run: Option<DateTime<Utc>>,
}

impl RunStats {
    /// Fold one cycle's outcome into the running totals.
    pub fn record_cycle(
        &mut self,
        processed: usize,
        successful: usize,
        failed: usize,
        at: DateTime<Utc>,
    ) {
        self.total_processed += processed as u64;
        self.successful += successful as u64;
        self.failed += failed as u64;
        self.last_run = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_cycle_accumulates() {
        let mut stats = RunStats::default();
        let t1 = Utc::now();
        stats.record_cycle(3, 2, 1, t1);
        stats.record_cycle(0, 0, 0, t1);
        stats.record_cycle(2, 2, 0, t1);

        assert_eq!(stats.total_processed, 5);
        assert_eq!(stats.successful, 4);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.last_run, Some(t1));
    }
}
