//! # Push Delivery Engine
//!
//! Delivers published events to webhook subscribers without holding up the
//! publish request.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PushDispatcher                         │
//! │  ┌────────────┐   ┌──────────────┐   ┌──────────────────┐   │
//! │  │  filter    │ → │ TaskTracker  │ → │ SubscriberClient │ → HTTP POST
//! │  │ per target │   │ (1 per sub)  │   │ (retry + cancel) │   │
//! │  └────────────┘   └──────────────┘   └──────────────────┘   │
//! │                          ↑                                   │
//! │              CancellationRegistry (per topic, subscriber)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Outcomes
//!
//! - Any HTTP response ends a delivery successfully.
//! - A revoked signal ends it as cancelled, logged at INFO.
//! - Exhausted retries are logged once by the client.
//! - Anything else is logged at ERROR as a delivery failure.

pub mod client;
pub mod dispatcher;
pub mod policy;
pub mod stats;

pub use client::{
    DeliveryRequest, DeliveryResponse, HttpSubscriberClient, SendError, SubscriberClient,
    DELIVERY_COUNT_HEADER, EVENT_TYPE_HEADER,
};
pub use dispatcher::PushDispatcher;
pub use policy::RetryPolicy;
pub use stats::{PushStats, PushStatsSnapshot};
