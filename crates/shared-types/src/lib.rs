//! # Shared Types Crate
//!
//! Domain types shared by every crate of the emulator.
//!
//! ## Contents
//!
//! - [`CloudEvent`]: the event envelope as it arrives on the publish
//!   endpoints and as it leaves on push deliveries and pull receives.
//! - [`EventFilter`]: per-subscription event type filter.
//! - [`TopicsConfig`]: the topic -> subscriber mapping, read through a
//!   [`TopicConfigSource`] so a hot reload never changes it mid-request.
//!
//! ## Mutation Rule
//!
//! An envelope is immutable once published. The only field the engine
//! touches is `source`, filled in once by [`CloudEvent::apply_defaults`]
//! when the producer left it empty.

pub mod cloud_event;
pub mod errors;
pub mod filter;
pub mod topics;

pub use cloud_event::{apply_defaults, deserialize_events, CloudEvent, DEFAULT_SOURCE_PREFIX};
pub use errors::FormatError;
pub use filter::{filter_events, EventFilter};
pub use topics::{
    SharedTopics, SubscriberEntry, SubscriberKind, TopicConfigSource, TopicsConfig, TopicsDiff,
    PULL_SCHEME,
};
