//! # CloudEvent Envelope
//!
//! The structured-mode JSON shape of a CloudEvents 1.0 event, plus the
//! deserialization and default-fill rules applied at publish time.

use crate::errors::FormatError;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Prefix of the `source` attribute assigned to events published without one.
///
/// The topic name is appended, yielding the resource id of the topic as the
/// real service would report it.
pub const DEFAULT_SOURCE_PREFIX: &str = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/eventgridemulator/providers/Microsoft.EventGrid/topics/";

/// CloudEvents specification version assumed when the producer omits it.
pub const SPEC_VERSION: &str = "1.0";

/// One published event.
///
/// Unknown top-level attributes are CloudEvents extensions and are kept
/// verbatim in `extensions` so they round-trip to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudEvent {
    /// Producer-supplied identifier.
    pub id: String,

    /// Event origin. Empty until [`CloudEvent::apply_defaults`] runs if the
    /// producer omitted it.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub source: String,

    /// Event type, the attribute subscription filters match on.
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default = "default_spec_version")]
    pub specversion: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<FixedOffset>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacontenttype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataschema: Option<String>,

    /// Opaque payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Binary payload, base64 encoded by the producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_base64: Option<String>,

    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl CloudEvent {
    /// Create an event with the required attributes only.
    pub fn new(id: impl Into<String>, source: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            event_type: event_type.into(),
            specversion: default_spec_version(),
            time: None,
            subject: None,
            datacontenttype: None,
            dataschema: None,
            data: None,
            data_base64: None,
            extensions: Map::new(),
        }
    }

    /// Attach a JSON payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.datacontenttype = Some("application/json".to_string());
        self.data = Some(data);
        self
    }

    /// Fill in `source` from the topic name when the producer left it empty.
    ///
    /// This is the only mutation the engine ever applies to an envelope.
    pub fn apply_defaults(&mut self, topic: &str) {
        if self.source.is_empty() {
            self.source = format!("{DEFAULT_SOURCE_PREFIX}{topic}");
        }
    }
}

/// Apply [`CloudEvent::apply_defaults`] to a whole publish batch.
pub fn apply_defaults(events: &mut [CloudEvent], topic: &str) {
    for event in events {
        event.apply_defaults(topic);
    }
}

/// Parse a publish body.
///
/// Accepts a single CloudEvent object or an array of them. Either every
/// event parses and validates, or the whole body is rejected.
///
/// # Errors
///
/// - `FormatError::Json` - invalid JSON or an event with the wrong shape
/// - `FormatError::UnexpectedShape` - JSON that is neither object nor array
/// - `FormatError::EmptyAttribute` - an empty `id` or `type`
pub fn deserialize_events(body: &[u8]) -> Result<Vec<CloudEvent>, FormatError> {
    let value: Value = serde_json::from_slice(body)?;

    let events = match value {
        Value::Array(_) => serde_json::from_value::<Vec<CloudEvent>>(value)?,
        Value::Object(_) => vec![serde_json::from_value::<CloudEvent>(value)?],
        _ => return Err(FormatError::UnexpectedShape),
    };

    for (index, event) in events.iter().enumerate() {
        if event.id.is_empty() {
            return Err(FormatError::EmptyAttribute {
                index,
                attribute: "id",
            });
        }
        if event.event_type.is_empty() {
            return Err(FormatError::EmptyAttribute {
                index,
                attribute: "type",
            });
        }
    }

    Ok(events)
}

fn default_spec_version() -> String {
    SPEC_VERSION.to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
