//! Observability for edge SSR response finalization.
//!
//! This crate provides:
//! - `StructuredLogger` - Request-scoped structured logging on `tracing`
//! - `init_logging` - Global subscriber setup (JSON or human output)
//! - `DeprecationNotices` - Warnings emitted once per process

mod deprecation;
mod logging;
mod subscriber;

pub use deprecation::*;
pub use logging::*;
pub use subscriber::*;

// Re-export RequestId and TimingContext from edge-core for convenience
pub use edge_core::{RequestId, TimingContext};
