//! Content-Security-Policy assembly for edge SSR responses.
//!
//! This crate provides:
//! - `CspOptions` / `CspPolicies` - CSP configuration (allow-list or full policy)
//! - `build_csp` - Per-render header value with inline-script hashes merged in
//! - `ContentHash` - `'sha256-...'` sources for inline scripts
//!
//! # Example
//!
//! ```ignore
//! use edge_security::{build_csp, hash_inline_scripts, CspOptions, CspPolicies, HashAlgorithm};
//!
//! let hashes = hash_inline_scripts(HashAlgorithm::Sha256, ["window.__STATE__ = {}"]);
//!
//! let options = CspOptions::enabled().with_policies(
//!     CspPolicies::new()
//!         .directive("default-src", ["'self'"])
//!         .directive("script-src", ["https://cdn.example.com"]),
//! );
//!
//! let value = build_csp(&hashes, &options, false);
//! response.headers_mut().insert(options.header().name(), value.parse()?);
//! ```

mod csp;
mod hash;

pub use csp::*;
pub use hash::*;
