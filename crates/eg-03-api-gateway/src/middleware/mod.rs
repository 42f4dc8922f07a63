//! Middleware stack for the gateway.
//!
//! Layer order: Request → Tracing → BodyLimit → Handler

pub mod tracing;

pub use self::tracing::{TracingLayer, REQUEST_ID_HEADER};
