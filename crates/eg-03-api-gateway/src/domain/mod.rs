//! Gateway domain: configuration, errors and the publish pipeline.

pub mod config;
pub mod error;
pub mod publish;

pub use config::{ConfigError, DeliveryConfig, GatewayConfig, PullConfig, ServerConfig};
pub use error::{ApiError, ApiResult, GatewayError};
pub use publish::{PublishOutcome, PublishService};
