//! # Event Filter
//!
//! Per-subscription filtering on the event `type` attribute.

use crate::cloud_event::CloudEvent;
use serde::{Deserialize, Serialize};

/// Filter attached to a subscription.
///
/// `included_event_types: None` lets every event through. `Some(list)` keeps
/// only events whose type is in the list, so an empty list drops everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(default)]
    pub included_event_types: Option<Vec<String>>,
}

impl EventFilter {
    /// A filter that lets every event through.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter that keeps only the given event types.
    #[must_use]
    pub fn types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            included_event_types: Some(types.into_iter().map(Into::into).collect()),
        }
    }

    /// Check whether an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &CloudEvent) -> bool {
        match &self.included_event_types {
            None => true,
            Some(types) => types.iter().any(|t| *t == event.event_type),
        }
    }
}

/// Select the events of a batch that pass an optional filter.
///
/// Applied independently per subscription; the returned references keep the
/// batch order.
pub fn filter_events<'a>(events: &'a [CloudEvent], filter: Option<&EventFilter>) -> Vec<&'a CloudEvent> {
    match filter {
        None => events.iter().collect(),
        Some(filter) => events.iter().filter(|e| filter.matches(e)).collect(),
    }
}
