//! # Pull Queue
//!
//! Per-subscription queue backing pull delivery.
//!
//! ## State Machine
//!
//! ```text
//!              enqueue
//!                 │
//!                 ▼
//!           ┌───────────┐  try_lock_next(ttl)   ┌──────────┐
//!           │ Available │ ────────────────────► │  Locked  │
//!           └───────────┘                       └──────────┘
//!                 ▲        try_release / expiry      │
//!                 └──────────────────────────────────┤
//!                                                    │ try_delete
//!                                                    ▼
//!                                                 Deleted
//! ```
//!
//! - Available events are handed out oldest first, by publish sequence.
//!   A released or expired event goes back to its original position.
//! - `delivery_count` is incremented on every transition into Locked.
//! - Lock expiry is lazy: any operation first moves expired locks back to
//!   Available, so an expired token fails delete and release.
//!
//! One mutex guards the whole state; critical sections do no I/O and touch
//! only ordered maps keyed by sequence, token or expiry.

use parking_lot::Mutex;
use shared_types::CloudEvent;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tracing::debug;
use uuid::Uuid;

/// Opaque lock token handed to pull consumers.
pub type LockToken = String;

/// Longest span [`deadline_after`] adds to an instant, roughly 30 years.
pub const MAX_SPAN: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + span`, clamped to [`MAX_SPAN`] so it cannot overflow.
pub fn deadline_after(now: Instant, span: Duration) -> Instant {
    now.checked_add(span.min(MAX_SPAN)).unwrap_or(now)
}

/// An event currently locked for one consumer.
#[derive(Debug, Clone)]
pub struct LockedDelivery {
    pub lock_token: LockToken,
    pub event: Arc<CloudEvent>,
    /// Number of times this event has been locked, this lock included.
    pub delivery_count: u32,
    pub expires_at: Instant,
}

/// An event held by the queue.
#[derive(Debug)]
struct QueuedEvent {
    seq: u64,
    event: Arc<CloudEvent>,
    delivery_count: u32,
}

#[derive(Debug)]
struct LockedEvent {
    queued: QueuedEvent,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    /// Next publish sequence number.
    next_seq: u64,
    /// Available events by publish sequence.
    available: BTreeMap<u64, QueuedEvent>,
    /// Locked events by token.
    locked: HashMap<LockToken, LockedEvent>,
    /// Lock expiry index: (expiry, seq) -> token.
    expiries: BTreeMap<(Instant, u64), LockToken>,
}

impl QueueState {
    /// Move every lock that expired at or before `now` back to Available.
    fn reclaim_expired(&mut self, now: Instant) -> usize {
        let mut reclaimed = 0;

        while let Some(entry) = self.expiries.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let token = entry.remove();
            if let Some(locked) = self.locked.remove(&token) {
                self.available.insert(locked.queued.seq, locked.queued);
                reclaimed += 1;
            }
        }

        reclaimed
    }

    fn unlock(&mut self, token: &str) -> Option<QueuedEvent> {
        let locked = self.locked.remove(token)?;
        self.expiries.remove(&(locked.expires_at, locked.queued.seq));
        Some(locked.queued)
    }
}

/// Thread-safe queue for one pull subscription.
///
/// No capacity bound is imposed; events accumulate until acknowledged.
#[derive(Debug, Default)]
pub struct PullQueue {
    state: Mutex<QueueState>,
    /// Woken whenever an event becomes Available.
    available: Notify,
}

impl PullQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event as Available.
    pub fn enqueue(&self, event: Arc<CloudEvent>) {
        {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.available.insert(
                seq,
                QueuedEvent {
                    seq,
                    event,
                    delivery_count: 0,
                },
            );
        }
        self.available.notify_one();
    }

    /// Lock the oldest Available event for `ttl`.
    ///
    /// Returns `None` when nothing is Available. Concurrent callers never
    /// receive the same event.
    pub fn try_lock_next(&self, ttl: Duration) -> Option<LockedDelivery> {
        let now = Instant::now();
        let expires_at = deadline_after(now, ttl);
        let (delivery, reclaimed) = {
            let mut state = self.state.lock();
            let reclaimed = state.reclaim_expired(now);

            let delivery = state.available.pop_first().map(|(seq, mut queued)| {
                queued.delivery_count += 1;
                let lock_token = Uuid::new_v4().to_string();
                let delivery = LockedDelivery {
                    lock_token: lock_token.clone(),
                    event: Arc::clone(&queued.event),
                    delivery_count: queued.delivery_count,
                    expires_at,
                };
                state.expiries.insert((expires_at, seq), lock_token.clone());
                state.locked.insert(lock_token, LockedEvent { queued, expires_at });
                delivery
            });
            (delivery, reclaimed)
        };

        // We took at most one of the reclaimed events; others may be waiting.
        let extra = reclaimed.saturating_sub(usize::from(delivery.is_some()));
        self.wake(extra);

        if let Some(delivery) = &delivery {
            debug!(
                event_id = %delivery.event.id,
                delivery_count = delivery.delivery_count,
                "Locked pull event"
            );
        }
        delivery
    }

    /// Wait until an event can be locked or `deadline` passes.
    ///
    /// Suspends on the queue's notifier and on the earliest lock expiry;
    /// never spins. After the deadline the queue is checked one last time
    /// so an event that arrived with the deadline is not lost.
    pub async fn lock_next_until(&self, ttl: Duration, deadline: Instant) -> Option<LockedDelivery> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(delivery) = self.try_lock_next(ttl) {
                return Some(delivery);
            }
            if Instant::now() >= deadline {
                return None;
            }

            let wake_at = self
                .next_expiry()
                .map_or(deadline, |expiry| expiry.min(deadline));

            tokio::select! {
                () = &mut notified => {}
                () = sleep_until(wake_at) => {}
            }
        }
    }

    /// Permanently remove the event locked under `token`.
    ///
    /// Returns `false` for unknown, expired or already consumed tokens.
    pub fn try_delete(&self, token: &str) -> bool {
        let (deleted, reclaimed) = {
            let mut state = self.state.lock();
            let reclaimed = state.reclaim_expired(Instant::now());
            (state.unlock(token).is_some(), reclaimed)
        };
        self.wake(reclaimed);
        deleted
    }

    /// Return the event locked under `token` to Available.
    ///
    /// Returns `false` for unknown, expired or already consumed tokens.
    pub fn try_release(&self, token: &str) -> bool {
        let (released, reclaimed) = {
            let mut state = self.state.lock();
            let reclaimed = state.reclaim_expired(Instant::now());
            let released = match state.unlock(token) {
                Some(queued) => {
                    state.available.insert(queued.seq, queued);
                    true
                }
                None => false,
            };
            (released, reclaimed)
        };
        self.wake(reclaimed + usize::from(released));
        released
    }

    /// Earliest lock expiry, if any event is Locked.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.state
            .lock()
            .expiries
            .first_key_value()
            .map(|((expiry, _), _)| *expiry)
    }

    /// Number of Available events, counting expired locks as Available.
    pub fn available_len(&self) -> usize {
        let now = Instant::now();
        let state = self.state.lock();
        let expired = state.expiries.range(..=(now, u64::MAX)).count();
        state.available.len() + expired
    }

    /// Number of events under a live lock.
    pub fn locked_len(&self) -> usize {
        let now = Instant::now();
        let state = self.state.lock();
        let expired = state.expiries.range(..=(now, u64::MAX)).count();
        state.locked.len() - expired
    }

    fn wake(&self, count: usize) {
        for _ in 0..count {
            self.available.notify_one();
        }
    }
}
