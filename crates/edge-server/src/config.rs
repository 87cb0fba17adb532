//! Render configuration.

use std::path::Path;

use anyhow::Result;
use edge_cache::{EtagHasher, EtagOptions, SharedEtagHasher};
use edge_core::{load_config, ConfigError};
use edge_push::Http2Options;
use edge_security::CspOptions;
use serde::{Deserialize, Serialize};

/// Response finalization settings.
///
/// Closures (`http2.should_push`, `http2.push_assets`, the ETag hasher) are
/// attached with the builder methods; they are not part of the file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Development mode.
    pub dev: bool,
    /// `crossorigin` value added to preload `Link` entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crossorigin: Option<String>,
    /// ETag generation.
    pub etag: EtagOptions,
    /// HTTP/2 preload headers.
    pub http2: Http2Options,
    /// Content-Security-Policy.
    pub csp: CspOptions,
    /// Custom ETag hash function.
    #[serde(skip)]
    pub etag_hasher: Option<SharedEtagHasher>,
}

impl RenderConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a TOML or JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Set development mode.
    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    /// Set the `crossorigin` value for preload entries.
    pub fn with_crossorigin(mut self, crossorigin: impl Into<String>) -> Self {
        self.crossorigin = Some(crossorigin.into());
        self
    }

    /// Set ETag options.
    pub fn with_etag(mut self, etag: EtagOptions) -> Self {
        self.etag = etag;
        self
    }

    /// Use a custom ETag hash function.
    pub fn with_etag_hasher(mut self, hasher: impl EtagHasher + 'static) -> Self {
        self.etag_hasher = Some(SharedEtagHasher::new(hasher));
        self
    }

    /// Set HTTP/2 push options.
    pub fn with_http2(mut self, http2: Http2Options) -> Self {
        self.http2 = http2;
        self
    }

    /// Set CSP options.
    pub fn with_csp(mut self, csp: CspOptions) -> Self {
        self.csp = csp;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(crossorigin) = &self.crossorigin {
            if crossorigin.is_empty()
                || crossorigin
                    .chars()
                    .any(|c| c.is_whitespace() || c.is_control() || c == ';' || c == ',')
            {
                return Err(ConfigError::Invalid(format!(
                    "crossorigin must be a single token, got {:?}",
                    crossorigin
                )));
            }
        }

        self.csp
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("csp: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::{parse_config, ConfigFormat};
    use edge_security::CspPolicies;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();
        assert!(!config.dev);
        assert!(config.etag.enabled);
        assert!(!config.etag.weak);
        assert!(!config.http2.push);
        assert!(!config.csp.enabled);
        assert!(config.etag_hasher.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            dev = true
            crossorigin = "anonymous"

            [etag]
            weak = true

            [http2]
            push = true

            [csp]
            enabled = true
            report_only = true
            allowed_sources = ["https://cdn.example"]
        "#;

        let config: RenderConfig = parse_config(toml, ConfigFormat::Toml).unwrap();
        assert!(config.dev);
        assert_eq!(config.crossorigin.as_deref(), Some("anonymous"));
        assert!(config.etag.enabled);
        assert!(config.etag.weak);
        assert!(config.http2.push);
        assert!(config.csp.report_only);
        assert_eq!(
            config.csp.allowed_sources,
            Some(vec!["https://cdn.example".to_string()])
        );
    }

    #[test]
    fn test_parse_json_policies() {
        let json = r#"{
            "csp": {
                "enabled": true,
                "policies": {
                    "default-src": ["'self'"],
                    "script-src": "https://cdn.example"
                }
            }
        }"#;

        let config: RenderConfig = parse_config(json, ConfigFormat::Json).unwrap();
        let policies = config.csp.policies.unwrap();
        assert_eq!(policies.get("default-src").unwrap(), ["'self'".to_string()]);
        assert_eq!(
            policies.get("script-src").unwrap(),
            ["https://cdn.example".to_string()]
        );
    }

    #[test]
    fn test_builder() {
        let config = RenderConfig::new()
            .with_dev(true)
            .with_crossorigin("use-credentials")
            .with_etag(EtagOptions::disabled())
            .with_http2(Http2Options::enabled())
            .with_csp(CspOptions::enabled().report_only(true))
            .with_etag_hasher(|body: &str, _: &EtagOptions| format!("\"{}\"", body.len()));

        assert!(config.dev);
        assert!(!config.etag.enabled);
        assert!(config.http2.push);
        assert!(config.csp.report_only);
        assert!(config.etag_hasher.is_some());
    }

    #[test]
    fn test_validate_rejects_bad_crossorigin() {
        let config = RenderConfig::new().with_crossorigin("anonymous; evil");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = RenderConfig::new().with_crossorigin("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_policy() {
        let config = RenderConfig::new().with_csp(
            CspOptions::enabled().with_policies(CspPolicies::new().directive("script src", ["'self'"])),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("csp"));
    }

    #[test]
    fn test_allow_list_and_policies_together_are_valid() {
        let config = RenderConfig::new().with_csp(
            CspOptions::enabled()
                .with_allowed_sources(["https://cdn.example"])
                .with_policies(CspPolicies::new().directive("default-src", ["'self'"])),
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let err = RenderConfig::load("/nonexistent/render.toml").unwrap_err();
        assert!(err.to_string().contains("render.toml"));
    }
}
