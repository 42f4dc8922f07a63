//! Push delivery counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals, updated lock-free by delivery tasks.
#[derive(Debug, Default)]
pub struct PushStats {
    pub dispatched: AtomicU64,
    pub succeeded: AtomicU64,
    pub cancelled: AtomicU64,
    pub exhausted: AtomicU64,
    pub failed: AtomicU64,
}

/// Point-in-time copy of [`PushStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushStatsSnapshot {
    pub dispatched: u64,
    pub succeeded: u64,
    pub cancelled: u64,
    pub exhausted: u64,
    pub failed: u64,
    pub in_flight: u64,
}

impl PushStats {
    pub fn snapshot(&self, in_flight: usize) -> PushStatsSnapshot {
        PushStatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            in_flight: in_flight as u64,
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
