//! # Shared Bus - Engine State Shared Across Requests
//!
//! Every structure in this crate is shared, mutable and hit concurrently by
//! many HTTP requests. All of them synchronize internally; callers never take
//! their own locks.
//!
//! ## Components
//!
//! ```text
//!  publish ──► TopicSubscriptions ──► PullQueue (topic, subscription)
//!                                        │  Available ─lock─► Locked
//!                                        │      ▲               │
//!                                        │      └─release/expiry┘
//!                                        │                      │ ack/reject
//!                                        ▼                      ▼
//!  receive ◄── wait on Notify ◄──────────┘                   Deleted
//!
//!  push delivery ──► CancellationRegistry (topic, endpoint) ──► CancellationToken
//! ```
//!
//! ## Atomicity
//!
//! Each operation is atomic with respect to one queue or one registry
//! entry. There are no cross-structure transactions.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod pull_queue;
pub mod registry;
pub mod subscriptions;

pub use pull_queue::{deadline_after, LockToken, LockedDelivery, PullQueue, MAX_SPAN};
pub use registry::{CancellationRegistry, SubscriberKey};
pub use subscriptions::TopicSubscriptions;

/// Lock duration applied to pulled events when configuration says nothing.
pub const DEFAULT_LOCK_DURATION_SECS: u64 = 60;
