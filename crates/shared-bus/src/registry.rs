//! # Subscriber Cancellation Registry
//!
//! Process-wide table of cancellation signals, one per (topic, subscriber)
//! pair. Push deliveries capture the signal of their subscriber when they
//! start; revoking the entry cancels every delivery still holding it.
//!
//! ## Lifecycle
//!
//! - `get` lazily creates the signal for a key, as a child of the registry's
//!   root token.
//! - `revoke` removes the entry and cancels its signal. The next `get` for
//!   the same key creates a fresh signal with a new generation.
//! - `revoke_all` cancels the root. Every live signal fires, and signals
//!   created afterwards are born cancelled, so deliveries started during
//!   shutdown stop immediately.
//!
//! A `get` racing a `revoke` on the same key is serialized by the map's
//! shard lock: it returns either the old signal (which the revoke then
//! cancels) or the new one, never a torn entry.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Registry key: a subscriber endpoint within a topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberKey {
    pub topic: String,
    pub subscriber: String,
}

impl SubscriberKey {
    pub fn new(topic: impl Into<String>, subscriber: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            subscriber: subscriber.into(),
        }
    }
}

impl fmt::Display for SubscriberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.topic, self.subscriber)
    }
}

/// A live signal and the generation it was created in.
struct RegistryEntry {
    token: CancellationToken,
    generation: u64,
}

/// Concurrent map from subscriber key to revocable cancellation signal.
pub struct CancellationRegistry {
    /// Parent of every handed-out signal; cancelled at shutdown.
    root: CancellationToken,

    /// Live signals by key.
    entries: DashMap<SubscriberKey, RegistryEntry>,

    /// Source of generation numbers, strictly increasing across all keys.
    generation: AtomicU64,
}

impl CancellationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Return the live signal for a subscriber, creating it on first use.
    pub fn get(&self, topic: &str, subscriber: &str) -> CancellationToken {
        let key = SubscriberKey::new(topic, subscriber);
        self.entries
            .entry(key)
            .or_insert_with(|| {
                let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    topic = topic,
                    subscriber = subscriber,
                    generation = generation,
                    "Created subscriber cancellation signal"
                );
                RegistryEntry {
                    token: self.root.child_token(),
                    generation,
                }
            })
            .token
            .clone()
    }

    /// Cancel and forget the signal of a subscriber.
    ///
    /// Returns `false` when no signal was live for the key.
    pub fn revoke(&self, topic: &str, subscriber: &str) -> bool {
        let key = SubscriberKey::new(topic, subscriber);
        let Some((key, entry)) = self.entries.remove(&key) else {
            return false;
        };

        entry.token.cancel();
        info!(
            subscriber = %key,
            generation = entry.generation,
            "Revoked subscriber cancellation signal"
        );
        true
    }

    /// Cancel every signal, present and future. Called once at shutdown.
    pub fn revoke_all(&self) {
        self.root.cancel();
        let revoked = self.entries.len();
        self.entries.clear();
        info!(revoked = revoked, "Revoked all subscriber cancellation signals");
    }

    /// Whether `revoke_all` has run.
    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Generation of the live signal for a key, if any.
    pub fn generation(&self, topic: &str, subscriber: &str) -> Option<u64> {
        self.entries
            .get(&SubscriberKey::new(topic, subscriber))
            .map(|entry| entry.generation)
    }

    /// Number of live signals.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
