//! Error types for rendering and configuration.

use http::StatusCode;
use thiserror::Error;

/// Errors raised while rendering a route.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The request URL could not be decoded.
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// The renderer failed without a specific status.
    #[error("Render failed: {0}")]
    Failed(String),

    /// The renderer failed and asked for a specific status code.
    #[error("Render failed with status {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// Any other error bubbling up from the renderer.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RenderError {
    /// Create a failure with an explicit status code.
    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Status code the error pipeline should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidUri(_) => StatusCode::BAD_REQUEST,
            Self::Status { status, .. } => *status,
            Self::Failed(_) | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_uri_maps_to_bad_request() {
        let err = RenderError::InvalidUri("/%zz".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_explicit_status_is_kept() {
        let err = RenderError::with_status(StatusCode::NOT_FOUND, "missing page");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            err.to_string(),
            "Render failed with status 404 Not Found: missing page"
        );
    }

    #[test]
    fn test_other_errors_are_internal() {
        assert_eq!(
            RenderError::Failed("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let err: RenderError = anyhow::anyhow!("loader crashed").into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
