//! Finalization errors.

use edge_core::RenderError;
use http::header::{HeaderName, InvalidHeaderValue};
use http::StatusCode;
use thiserror::Error;

/// Errors returned to the caller of [`crate::ResponseFinalizer::finalize`].
#[derive(Debug, Error)]
pub enum FinalizeError {
    /// Rendering failed after the route had already redirected.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A computed header value is not a valid HTTP header value.
    #[error("Invalid value for header {name}")]
    InvalidHeader {
        name: HeaderName,
        #[source]
        source: InvalidHeaderValue,
    },
}

impl FinalizeError {
    /// Status code a host should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Render(err) => err.status_code(),
            Self::InvalidHeader { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
