//! Core abstractions for edge SSR response finalization.
//!
//! This crate provides the fundamental types and traits:
//! - `load_config` - TOML or JSON configuration loading
//! - `Renderer` trait - The external page renderer
//! - `RenderedResult` / `PreloadAsset` - What a render hands back
//! - `RequestContext` - Request metadata and timing
//! - `LifecyclePhase` - Request lifecycle tracking

mod config;
mod context;
mod error;
mod lifecycle;
mod render;

pub use config::*;
pub use context::*;
pub use error::*;
pub use lifecycle::*;
pub use render::*;
