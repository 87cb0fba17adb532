//! One-time deprecation warnings.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

/// Registry of deprecation warnings already emitted.
#[derive(Debug, Default)]
pub struct DeprecationNotices {
    seen: Mutex<HashSet<String>>,
}

impl DeprecationNotices {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static DeprecationNotices {
        static GLOBAL: OnceLock<DeprecationNotices> = OnceLock::new();
        GLOBAL.get_or_init(DeprecationNotices::new)
    }

    /// Warn about `key` unless it was already reported.
    ///
    /// Returns `true` when the warning was emitted by this call.
    pub fn warn_once(&self, key: &str, message: &str) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !seen.insert(key.to_string()) {
            return false;
        }
        drop(seen);

        tracing::warn!(deprecation = key, "{}", message);
        true
    }

    /// Check whether `key` was reported.
    pub fn was_reported(&self, key: &str) -> bool {
        match self.seen.lock() {
            Ok(seen) => seen.contains(key),
            Err(poisoned) => poisoned.into_inner().contains(key),
        }
    }
}
