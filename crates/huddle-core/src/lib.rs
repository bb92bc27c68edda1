//! Shared infrastructure for the huddle SDK crates.
//!
//! Currently this is limited to tracing/logging setup; the wire types
//! live in `huddle-protocol` and the socket client in `huddle-realtime`.

pub mod tracing;

pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
