//! Public SDK for edge SSR response finalization.
//!
//! This crate re-exports all platform functionality:
//!
//! ```ignore
//! use edge_sdk::prelude::*;
//!
//! init_logging(LogFormat::Json, "info")?;
//!
//! let config = RenderConfig::load("render.toml")?
//!     .with_http2(Http2Options::enabled().with_should_push(|_, as_type| {
//!         *as_type == AssetType::Script
//!     }));
//! let finalizer = ResponseFinalizer::new(Arc::new(MyRenderer), config);
//!
//! match finalizer.finalize(&request).await? {
//!     Finalized::Page(response) | Finalized::Redirect(response) => send(response),
//!     Finalized::Forwarded(error_page) => send(error_page),
//! }
//! ```

pub use edge_cache;
pub use edge_core;
pub use edge_observability;
pub use edge_push;
pub use edge_security;
pub use edge_server;

/// Prelude for convenient imports.
pub mod prelude {
    pub use edge_cache::*;
    pub use edge_core::*;
    pub use edge_observability::*;
    pub use edge_push::*;
    pub use edge_security::*;
    pub use edge_server::*;
}
