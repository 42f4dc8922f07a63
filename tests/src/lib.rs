//! # EventGrid Emulator Test Suite
//!
//! End-to-end tests that run the full gateway on an ephemeral port and talk
//! to it over HTTP, with an in-process webhook standing in for push
//! subscribers.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs      # Gateway + webhook fixtures
//!     ├── push_flows.rs   # Fan-out, filtering, revocation
//!     └── pull_flows.rs   # Receive / settle round trips
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p eg-tests
//! cargo test -p eg-tests integration::pull_flows
//! ```

#[allow(dead_code)]
mod integration;
