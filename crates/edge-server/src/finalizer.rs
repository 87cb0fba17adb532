//! Response finalization.
//!
//! A [`ResponseFinalizer`] renders a route once and turns the result into
//! the HTTP response: redirect short-circuit, error status, ETag and 304
//! handling, preload `Link` headers, Content-Security-Policy and the content
//! headers. The configuration is shared read-only between requests; all
//! per-request state lives in the [`RenderContext`].

use std::sync::Arc;

use edge_cache::{check_freshness, etag_for};
use edge_core::{
    LifecyclePhase, Redirect, RenderContext, RenderError, Renderer, RequestContext,
};
use edge_observability::StructuredLogger;
use edge_push::link_header_value;
use edge_security::build_csp;
use http::header::{
    HeaderName, HeaderValue, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LINK, LOCATION,
};
use http::{HeaderMap, Request, Response, StatusCode};

use crate::config::RenderConfig;
use crate::error::FinalizeError;
use crate::hooks::{ErrorPipeline, NoopHooks, PlainErrorPipeline, RenderHooks};

/// Public path used for preload entries when none is configured.
pub const DEFAULT_PUBLIC_PATH: &str = "/_assets/";

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Outcome of a finalized request.
#[derive(Debug)]
pub enum Finalized {
    /// The page (200, error status or 304).
    Page(Response<Vec<u8>>),
    /// The route redirected.
    Redirect(Response<Vec<u8>>),
    /// Rendering failed; the error pipeline produced this response.
    Forwarded(Response<Vec<u8>>),
}

impl Finalized {
    /// Borrow the response.
    pub fn response(&self) -> &Response<Vec<u8>> {
        match self {
            Self::Page(response) | Self::Redirect(response) | Self::Forwarded(response) => {
                response
            }
        }
    }

    /// Take the response.
    pub fn into_response(self) -> Response<Vec<u8>> {
        match self {
            Self::Page(response) | Self::Redirect(response) | Self::Forwarded(response) => {
                response
            }
        }
    }

    /// Response status.
    pub fn status(&self) -> StatusCode {
        self.response().status()
    }
}

/// Turns rendered pages into HTTP responses.
pub struct ResponseFinalizer {
    renderer: Arc<dyn Renderer>,
    config: Arc<RenderConfig>,
    public_path: String,
    hooks: Arc<dyn RenderHooks>,
    errors: Arc<dyn ErrorPipeline>,
}

impl ResponseFinalizer {
    /// Create a finalizer with no-op hooks and the plain error pipeline.
    pub fn new(renderer: Arc<dyn Renderer>, config: RenderConfig) -> Self {
        Self {
            renderer,
            config: Arc::new(config),
            public_path: DEFAULT_PUBLIC_PATH.to_string(),
            hooks: Arc::new(NoopHooks),
            errors: Arc::new(PlainErrorPipeline),
        }
    }

    /// Set the public path assets are served under.
    pub fn with_public_path(mut self, public_path: impl Into<String>) -> Self {
        self.public_path = public_path.into();
        self
    }

    /// Set the lifecycle hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn RenderHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Set the error pipeline.
    pub fn with_error_pipeline(mut self, errors: Arc<dyn ErrorPipeline>) -> Self {
        self.errors = errors;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// The public path in use.
    pub fn public_path(&self) -> &str {
        &self.public_path
    }

    /// Render and finalize an incoming request.
    pub async fn finalize<B>(&self, request: &Request<B>) -> Result<Finalized, FinalizeError> {
        self.finalize_context(RequestContext::from_request(request))
            .await
    }

    /// Render and finalize a request described by its context.
    ///
    /// Failures are forwarded to the error pipeline, unless the route had
    /// already redirected: then the error is logged and returned.
    pub async fn finalize_context(
        &self,
        request: RequestContext,
    ) -> Result<Finalized, FinalizeError> {
        let logger = StructuredLogger::new(request.request_id.clone()).with_route(request.path());
        let mut ctx = RenderContext::new(request);
        ctx.request.timing.mark_phase(&LifecyclePhase::Start);

        let url = match ctx.request.normalized_url() {
            Ok(url) => url,
            Err(err) => return Ok(self.forward(&mut ctx, &logger, err).await),
        };

        match self.respond(&url, &mut ctx, &logger).await {
            Ok(finalized) => Ok(finalized),
            Err(FinalizeError::Render(err)) if ctx.redirected() => {
                ctx.request
                    .timing
                    .mark_phase(&LifecyclePhase::Error(err.to_string()));
                logger
                    .error_builder("render failed after redirect")
                    .field("url", url.as_str())
                    .field("error", err.to_string())
                    .emit();
                Err(FinalizeError::Render(err))
            }
            Err(FinalizeError::Render(err)) => Ok(self.forward(&mut ctx, &logger, err).await),
            Err(err) => {
                logger
                    .error_builder("response finalization failed")
                    .field("url", url.as_str())
                    .field("error", err.to_string())
                    .emit();
                Err(err)
            }
        }
    }

    async fn respond(
        &self,
        url: &str,
        ctx: &mut RenderContext,
        logger: &StructuredLogger,
    ) -> Result<Finalized, FinalizeError> {
        let result = self.renderer.render_route(url, ctx).await?;
        ctx.request.timing.mark_phase(&LifecyclePhase::Rendered);
        self.hooks.on_route(url, &result, ctx).await;

        if let Some(redirect) = result
            .redirect
            .clone()
            .or_else(|| ctx.redirect_target().cloned())
        {
            ctx.request.timing.mark_phase(&LifecyclePhase::Redirected);
            self.hooks.route_done(url, &result, ctx).await;
            let response = redirect_response(&redirect)?;
            log_response(logger, url, ctx, response.status());
            return Ok(Finalized::Redirect(response));
        }

        let failed = result.is_error();
        let status = result
            .error
            .as_ref()
            .map(|failure| failure.status_code())
            .unwrap_or(StatusCode::OK);
        let mut headers = HeaderMap::new();

        if self.config.etag.enabled && !failed {
            let etag = etag_for(
                &result.html,
                &self.config.etag,
                self.config.etag_hasher.as_ref(),
            );
            headers.insert(ETAG, header_value(&ETAG, &etag)?);

            let freshness = check_freshness(&ctx.request.headers, &etag);
            logger
                .debug_builder("conditional request evaluated")
                .field("etag", etag.as_str())
                .field("freshness", freshness.to_string())
                .emit();

            if freshness.is_fresh() {
                ctx.request.timing.mark_phase(&LifecyclePhase::NotModified);
                self.hooks.before_response(url, &result, ctx).await;
                self.hooks.route_done(url, &result, ctx).await;

                let mut response = Response::new(Vec::new());
                *response.status_mut() = StatusCode::NOT_MODIFIED;
                *response.headers_mut() = headers;
                log_response(logger, url, ctx, response.status());
                return Ok(Finalized::Page(response));
            }
        }

        if self.config.http2.push && !failed {
            let links = self.config.http2.links(
                &ctx.request,
                &self.public_path,
                result.preload_files.get(),
                self.config.crossorigin.as_deref(),
                self.config.dev,
            );
            if let Some(link) = link_header_value(&links) {
                headers.insert(LINK, header_value(&LINK, &link)?);
            }
        }

        if self.config.csp.enabled {
            if let Some(hashes) = &result.csp_script_src_hashes {
                let policy = build_csp(hashes, &self.config.csp, self.config.dev);
                let name = self.config.csp.header().name();
                let value = header_value(&name, &policy)?;
                headers.insert(name, value);
            }
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("none"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(result.html.len()));

        self.hooks.before_response(url, &result, ctx).await;
        ctx.request.timing.mark_phase(&LifecyclePhase::Completion);
        self.hooks.route_done(url, &result, ctx).await;

        let mut response = Response::new(result.html.into_bytes());
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        log_response(logger, url, ctx, status);
        Ok(Finalized::Page(response))
    }

    async fn forward(
        &self,
        ctx: &mut RenderContext,
        logger: &StructuredLogger,
        error: RenderError,
    ) -> Finalized {
        ctx.request
            .timing
            .mark_phase(&LifecyclePhase::Error(error.to_string()));
        logger
            .warn_builder("forwarding render failure to error pipeline")
            .field("error", error.to_string())
            .field_u64("status", u64::from(error.status_code().as_u16()))
            .emit();

        Finalized::Forwarded(self.errors.handle(&ctx.request, error).await)
    }
}

fn redirect_response(redirect: &Redirect) -> Result<Response<Vec<u8>>, FinalizeError> {
    let mut response = Response::new(Vec::new());
    *response.status_mut() = redirect.status;
    response
        .headers_mut()
        .insert(LOCATION, header_value(&LOCATION, &redirect.location)?);
    response
        .headers_mut()
        .insert(CONTENT_LENGTH, HeaderValue::from(0usize));
    Ok(response)
}

fn header_value(name: &HeaderName, value: &str) -> Result<HeaderValue, FinalizeError> {
    HeaderValue::from_str(value).map_err(|source| FinalizeError::InvalidHeader {
        name: name.clone(),
        source,
    })
}

fn log_response(logger: &StructuredLogger, url: &str, ctx: &RenderContext, status: StatusCode) {
    let mut entry = logger
        .info_builder("response finalized")
        .field("url", url)
        .field_u64("status", u64::from(status.as_u16()))
        .duration_us("total_us", ctx.request.timing.elapsed());
    if let Some(render) = ctx.request.timing.render_time() {
        entry = entry.duration_us("render_us", render);
    }
    entry.emit();
}
