//! ETag generation for rendered documents.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of base64 digest characters kept in a generated tag.
const DIGEST_CHARS: usize = 27;

/// ETag configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtagOptions {
    /// Whether ETags are emitted.
    pub enabled: bool,
    /// Emit weak validators (`W/"..."`).
    pub weak: bool,
}

impl Default for EtagOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            weak: false,
        }
    }
}

impl EtagOptions {
    /// ETags turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set weak validators.
    pub fn with_weak(mut self, weak: bool) -> Self {
        self.weak = weak;
        self
    }
}

/// Custom ETag function, replacing the built-in content hash.
pub trait EtagHasher: Send + Sync {
    /// Produce the full ETag value (quotes included) for a document.
    fn etag(&self, body: &str, options: &EtagOptions) -> String;
}

impl<F> EtagHasher for F
where
    F: Fn(&str, &EtagOptions) -> String + Send + Sync,
{
    fn etag(&self, body: &str, options: &EtagOptions) -> String {
        self(body, options)
    }
}

/// Shared handle to a custom hasher.
#[derive(Clone)]
pub struct SharedEtagHasher(pub Arc<dyn EtagHasher>);

impl SharedEtagHasher {
    /// Wrap a hasher.
    pub fn new(hasher: impl EtagHasher + 'static) -> Self {
        Self(Arc::new(hasher))
    }
}

impl fmt::Debug for SharedEtagHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedEtagHasher(..)")
    }
}

/// Generate an ETag for a response body.
///
/// The tag is `"<hex length>-<27 base64 chars of SHA-256>"`, prefixed with
/// `W/` when `weak` is set. Tags are not byte-compatible with SHA-1 based
/// generators such as the npm `etag` package.
pub fn generate_etag(body: &[u8], weak: bool) -> String {
    let digest = STANDARD.encode(Sha256::digest(body));
    let tag = format!("\"{:x}-{}\"", body.len(), &digest[..DIGEST_CHARS]);
    if weak {
        format!("W/{}", tag)
    } else {
        tag
    }
}

/// Compute the ETag for a document, honoring a custom hasher.
pub fn etag_for(body: &str, options: &EtagOptions, hasher: Option<&SharedEtagHasher>) -> String {
    match hasher {
        Some(custom) => custom.0.etag(body, options),
        None => generate_etag(body.as_bytes(), options.weak),
    }
}
