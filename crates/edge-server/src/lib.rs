//! SSR response finalization for the edge rendering platform.
//!
//! This crate provides:
//! - `ResponseFinalizer` - Turns a rendered page into the final HTTP response
//! - `RenderConfig` - ETag, HTTP/2 push and CSP configuration
//! - `RenderHooks` - Route, before-response and completion notifications
//! - `ErrorPipeline` - Where render failures are forwarded
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use edge_server::{Finalized, RenderConfig, ResponseFinalizer};
//!
//! let config = RenderConfig::load("render.toml")?;
//! let finalizer = ResponseFinalizer::new(Arc::new(MyRenderer), config)
//!     .with_public_path("/_assets/");
//!
//! let response = finalizer.finalize(&request).await?.into_response();
//! ```

mod config;
mod error;
mod finalizer;
mod hooks;

pub use config::*;
pub use error::*;
pub use finalizer::*;
pub use hooks::*;
