//! Configuration file loading.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (default).
    Toml,
    /// JSON, selected by a `.json` extension.
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file path.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// Parse configuration text in the given format.
pub fn parse_config<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> Result<T> {
    match format {
        ConfigFormat::Json => serde_json::from_str(content).context("Failed to parse JSON config"),
        ConfigFormat::Toml => toml::from_str(content).context("Failed to parse TOML config"),
    }
}

/// Load configuration from a file.
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content, ConfigFormat::from_path(path))
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        #[serde(default)]
        dev: bool,
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("render.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("render.JSON")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("render.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("render")), ConfigFormat::Toml);
    }

    #[test]
    fn test_parse_toml() {
        let sample: Sample = parse_config("name = \"shop\"\ndev = true\n", ConfigFormat::Toml).unwrap();
        assert_eq!(
            sample,
            Sample {
                name: "shop".into(),
                dev: true
            }
        );
    }

    #[test]
    fn test_parse_json() {
        let sample: Sample = parse_config(r#"{"name":"shop"}"#, ConfigFormat::Json).unwrap();
        assert_eq!(sample.name, "shop");
        assert!(!sample.dev);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let result: Result<Sample> = parse_config("name = ", ConfigFormat::Toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result: Result<Sample> = load_config("/nonexistent/render.toml");
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Failed to read config file"));
    }
}
