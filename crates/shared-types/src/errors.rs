//! # Error Types
//!
//! Errors raised while turning a publish body into envelopes.

use thiserror::Error;

/// A publish body that cannot be turned into CloudEvents.
///
/// Always a client error. A body that fails with this error has no side
/// effects: nothing is enqueued and no delivery is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The body is not valid JSON, or an event has the wrong shape.
    #[error("malformed JSON body: {0}")]
    Json(String),

    /// The body is valid JSON but neither an object nor an array.
    #[error("expected a CloudEvent object or an array of CloudEvents")]
    UnexpectedShape,

    /// A required attribute is present but empty.
    #[error("event at index {index} has an empty '{attribute}' attribute")]
    EmptyAttribute {
        index: usize,
        attribute: &'static str,
    },
}

impl From<serde_json::Error> for FormatError {
    fn from(e: serde_json::Error) -> Self {
        FormatError::Json(e.to_string())
    }
}
