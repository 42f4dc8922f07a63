//! EG-03 API Gateway - HTTP surface of the emulator.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        API GATEWAY (eg-03)                        │
//! ├──────────────────────────────────────────────────────────────────┤
//! │   POST /topics/{t}:publish           POST .../{s}:receive         │
//! │   POST /topics/{t}/api/events        POST .../{s}:acknowledge     │
//! │   GET  /health                       POST .../{s}:release|reject  │
//! │         │                                   │                     │
//! │  ┌──────┴───────────────────────────────────┴──────┐              │
//! │  │        Middleware: Tracing → BodyLimit          │              │
//! │  └──────┬───────────────────────────────────┬──────┘              │
//! │         ▼                                   ▼                     │
//! │   PublishService                     PullDeliveryService          │
//! │     │        │                              │                     │
//! └─────┼────────┼──────────────────────────────┼─────────────────────┘
//!       ▼        ▼                              ▼
//!  PushDispatcher   TopicSubscriptions ◄────────┘
//!   (eg-01)          (shared-bus)
//! ```
//!
//! Every request reads one topic configuration snapshot and keeps it for
//! its whole lifetime, so a hot reload never changes routing mid-request.
//!
//! # Usage
//!
//! ```ignore
//! use eg_03_api_gateway::{ApiGatewayService, GatewayConfig};
//!
//! let service = ApiGatewayService::new(GatewayConfig::default())?;
//! service.start().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod middleware;
pub mod routes;
pub mod service;

pub use domain::{
    ApiError, ApiResult, ConfigError, DeliveryConfig, GatewayConfig, GatewayError,
    PublishOutcome, PublishService, PullConfig, ServerConfig,
};
pub use routes::{build_router, split_action, AppState};
pub use service::ApiGatewayService;
