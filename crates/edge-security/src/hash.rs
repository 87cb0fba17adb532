//! Inline script hashes for `script-src`.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use edge_core::ScriptSrcSet;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256 (recommended).
    #[default]
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Expected digest length in base64 characters (padding included).
    pub fn base64_length(&self) -> usize {
        match self {
            Self::Sha256 => 44,
            Self::Sha384 => 64,
            Self::Sha512 => 88,
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Some(Self::Sha256),
            "sha384" | "sha-384" => Some(Self::Sha384),
            "sha512" | "sha-512" => Some(Self::Sha512),
            _ => None,
        }
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Sha384 => write!(f, "sha384"),
            Self::Sha512 => write!(f, "sha512"),
        }
    }
}

/// A content hash in CSP source form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHash {
    /// The hash algorithm used.
    pub algorithm: HashAlgorithm,
    /// The digest, base64 encoded.
    pub digest: String,
}

impl ContentHash {
    /// Hash the body of an inline `<script>` element.
    pub fn of_inline_script(algorithm: HashAlgorithm, body: &str) -> Self {
        Self {
            algorithm,
            digest: STANDARD.encode(algorithm.digest(body.as_bytes())),
        }
    }

    /// Parse a hash source such as `'sha256-abc...='` (quotes optional).
    pub fn from_source(source: &str) -> Result<Self, HashError> {
        let unquoted = source.trim().trim_matches('\'');
        let (algo_str, digest) = unquoted
            .split_once('-')
            .ok_or_else(|| HashError::InvalidFormat("missing algorithm prefix".into()))?;

        let algorithm = HashAlgorithm::parse(algo_str)
            .ok_or_else(|| HashError::UnsupportedAlgorithm(algo_str.into()))?;

        let hash = Self {
            algorithm,
            digest: digest.to_string(),
        };
        hash.validate()?;
        Ok(hash)
    }

    /// The quoted `script-src` source, e.g. `'sha256-abc...='`.
    pub fn to_csp_source(&self) -> String {
        format!("'{}-{}'", self.algorithm, self.digest)
    }

    /// Validate the digest format.
    pub fn validate(&self) -> Result<(), HashError> {
        let expected = self.algorithm.base64_length();
        if self.digest.len() != expected {
            return Err(HashError::InvalidHashLength {
                expected,
                actual: self.digest.len(),
            });
        }

        if STANDARD.decode(&self.digest).is_err() {
            return Err(HashError::InvalidHashFormat(
                "digest is not valid base64".into(),
            ));
        }

        Ok(())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_csp_source())
    }
}

/// Hash every inline script of a page into a `script-src` source set.
pub fn hash_inline_scripts<'a, I>(algorithm: HashAlgorithm, scripts: I) -> ScriptSrcSet
where
    I: IntoIterator<Item = &'a str>,
{
    scripts
        .into_iter()
        .map(|body| ContentHash::of_inline_script(algorithm, body).to_csp_source())
        .collect()
}

/// Hash parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidHashLength { expected: usize, actual: usize },

    #[error("invalid hash format: {0}")]
    InvalidHashFormat(String),
}
