//! ETag and conditional GET support for edge SSR responses.
//!
//! This crate provides:
//! - `EtagOptions` - ETag configuration (enabled, weak)
//! - `generate_etag` / `EtagHasher` - Content hashing for rendered HTML
//! - `check_freshness` - `If-None-Match` evaluation for 304 responses
//!
//! # Example
//!
//! ```ignore
//! use edge_cache::{check_freshness, generate_etag, Freshness};
//!
//! let etag = generate_etag(html.as_bytes(), false);
//! if check_freshness(request.headers(), &etag) == Freshness::Fresh {
//!     // answer 304 Not Modified
//! }
//! ```

mod conditional;
mod etag;

pub use conditional::*;
pub use etag::*;
