//! Request and response bodies of the pull endpoints.

use serde::{Deserialize, Serialize};
use shared_bus::LockedDelivery;
use shared_types::CloudEvent;

/// Failure message for a token that is not currently locked.
pub const INVALID_TOKEN: &str = "invalid token";

/// `deliveryCount` reported on every receive.
///
/// The response carries a single event per request and always reports 1,
/// even on redelivery. The queue keeps the true count in
/// [`LockedDelivery::delivery_count`]; it is logged but not sent.
pub const WIRE_DELIVERY_COUNT: u32 = 1;

/// Result of a receive: empty on timeout, at most one element otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiveResults {
    pub value: Vec<ReceiveDetails>,
}

impl ReceiveResults {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl From<LockedDelivery> for ReceiveResults {
    fn from(delivery: LockedDelivery) -> Self {
        Self {
            value: vec![ReceiveDetails {
                broker_properties: BrokerProperties {
                    delivery_count: WIRE_DELIVERY_COUNT,
                    lock_token: delivery.lock_token,
                },
                event: CloudEvent::clone(&delivery.event),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveDetails {
    pub broker_properties: BrokerProperties,
    pub event: CloudEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerProperties {
    pub delivery_count: u32,
    pub lock_token: String,
}

/// Body of acknowledge, release and reject.
///
/// Both the list and its entries may be null; null entries are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockTokensRequest {
    #[serde(default)]
    pub lock_tokens: Option<Vec<Option<String>>>,
}

impl LockTokensRequest {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lock_tokens: Some(tokens.into_iter().map(|t| Some(t.into())).collect()),
        }
    }

    /// Non-null tokens in request order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.lock_tokens
            .iter()
            .flatten()
            .filter_map(|token| token.as_deref())
    }
}

/// Per-token outcome of a settlement request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockTokensResult {
    pub succeeded_lock_tokens: Vec<String>,
    pub failed_lock_tokens: Vec<FailedLockToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedLockToken {
    pub lock_token: String,
    pub error: ResponseError,
}

impl FailedLockToken {
    pub fn invalid(lock_token: impl Into<String>) -> Self {
        Self {
            lock_token: lock_token.into(),
            error: ResponseError {
                code: None,
                message: INVALID_TOKEN.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: Option<String>,
    pub message: String,
}
