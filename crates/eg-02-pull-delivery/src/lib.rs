//! # Pull Delivery
//!
//! Consumers ask for work, hold it under a lock token, then acknowledge,
//! release or reject it.
//!
//! | Operation | Queue call | Outcome per token |
//! |---|---|---|
//! | receive | `lock_next_until` | one event or empty after the wait cap |
//! | acknowledge | `try_delete` | succeeded or `invalid token` |
//! | reject | `try_delete` | succeeded or `invalid token` |
//! | release | `try_release` | succeeded or `invalid token` |
//!
//! Settlement never fails a whole request; each token stands on its own.

pub mod service;
pub mod wire;

pub use service::{PullDeliveryService, PullSettings, ReceiveError, DEFAULT_MAX_WAIT_SECS};
pub use wire::{
    BrokerProperties, FailedLockToken, LockTokensRequest, LockTokensResult, ReceiveDetails,
    ReceiveResults, ResponseError, INVALID_TOKEN, WIRE_DELIVERY_COUNT,
};
