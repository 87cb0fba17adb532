//! Collaborators notified or consulted during finalization.

use async_trait::async_trait;
use edge_core::{RenderContext, RenderError, RenderedResult, RequestContext};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::Response;

/// Render lifecycle notifications.
///
/// Every method defaults to doing nothing.
#[async_trait]
pub trait RenderHooks: Send + Sync {
    /// The route was rendered.
    async fn on_route(&self, _url: &str, _result: &RenderedResult, _ctx: &RenderContext) {}

    /// Headers are final; the body is about to be sent.
    async fn before_response(&self, _url: &str, _result: &RenderedResult, _ctx: &RenderContext) {}

    /// The request is complete (page, 304 or redirect).
    async fn route_done(&self, _url: &str, _result: &RenderedResult, _ctx: &RenderContext) {}
}

/// Hooks that ignore every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl RenderHooks for NoopHooks {}

/// Receives render failures that should become an error page.
#[async_trait]
pub trait ErrorPipeline: Send + Sync {
    /// Produce the response for a failed request.
    async fn handle(&self, request: &RequestContext, error: RenderError) -> Response<Vec<u8>>;
}

/// Answers with the error's status and its canonical reason as plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainErrorPipeline;

#[async_trait]
impl ErrorPipeline for PlainErrorPipeline {
    async fn handle(&self, _request: &RequestContext, error: RenderError) -> Response<Vec<u8>> {
        let status = error.status_code();
        let body = status.canonical_reason().unwrap_or("Error").as_bytes().to_vec();

        let mut response = Response::new(body);
        *response.status_mut() = status;
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}
