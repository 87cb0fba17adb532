//! HTTP/2 preload `Link` header selection for edge SSR responses.
//!
//! This crate provides:
//! - `Http2Options` - Push configuration (enable flag, predicate, custom selector)
//! - `PreloadSelector` - Default asset filtering and `Link` entry formatting
//! - `PushAssets` - Full replacement for the default selection
//!
//! # Example
//!
//! ```ignore
//! use edge_push::{link_header_value, PreloadSelector};
//!
//! let links = PreloadSelector::new("/_assets/").select(result.preload_files.get());
//! if let Some(value) = link_header_value(&links) {
//!     response.headers_mut().insert(http::header::LINK, value.parse()?);
//! }
//! ```

mod preload;

pub use preload::*;
