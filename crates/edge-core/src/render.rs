//! Render contract between the response finalizer and the page renderer.

use std::fmt;
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::RenderError;

/// Preload destination (`as=` value) of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssetType {
    Script,
    Style,
    Font,
    Image,
    Fetch,
    Document,
    /// Any other destination, kept verbatim.
    Other(String),
}

impl AssetType {
    /// Parse an `as` token.
    pub fn parse(value: &str) -> Self {
        match value {
            "script" => Self::Script,
            "style" => Self::Style,
            "font" => Self::Font,
            "image" => Self::Image,
            "fetch" => Self::Fetch,
            "document" => Self::Document,
            other => Self::Other(other.to_string()),
        }
    }

    /// The `as` token.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Script => "script",
            Self::Style => "style",
            Self::Font => "font",
            Self::Image => "image",
            Self::Fetch => "fetch",
            Self::Document => "document",
            Self::Other(value) => value,
        }
    }

    /// Scripts and stylesheets are preloaded by default.
    pub fn is_preloaded_by_default(&self) -> bool {
        matches!(self, Self::Script | Self::Style)
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for AssetType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<AssetType> for String {
    fn from(value: AssetType) -> Self {
        value.as_str().to_string()
    }
}

/// A static asset referenced by a rendered page, taken from the build manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadAsset {
    /// File path relative to the public path, query string included.
    pub file: String,
    /// Preload destination.
    pub as_type: AssetType,
    /// `file` without its query string.
    pub file_without_query: String,
    /// Module bundle for modern browsers.
    #[serde(default)]
    pub modern: bool,
}

impl PreloadAsset {
    /// Create an asset, deriving `file_without_query` from `file`.
    pub fn new(file: impl Into<String>, as_type: AssetType) -> Self {
        let file = file.into();
        let file_without_query = file
            .split_once('?')
            .map(|(path, _)| path.to_string())
            .unwrap_or_else(|| file.clone());
        Self {
            file,
            as_type,
            file_without_query,
            modern: false,
        }
    }

    /// Mark the asset as a modern module bundle.
    pub fn with_modern(mut self, modern: bool) -> Self {
        self.modern = modern;
        self
    }
}

type AssetLoader = Box<dyn FnOnce() -> Vec<PreloadAsset> + Send>;

/// Lazily evaluated list of preload assets.
///
/// The loader runs at most once, the first time the list is read.
pub struct PreloadFiles {
    cell: OnceLock<Vec<PreloadAsset>>,
    loader: Mutex<Option<AssetLoader>>,
}

impl PreloadFiles {
    /// An already evaluated list.
    pub fn ready(assets: Vec<PreloadAsset>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(assets);
        Self {
            cell,
            loader: Mutex::new(None),
        }
    }

    /// A list computed on first access.
    pub fn lazy<F>(loader: F) -> Self
    where
        F: FnOnce() -> Vec<PreloadAsset> + Send + 'static,
    {
        Self {
            cell: OnceLock::new(),
            loader: Mutex::new(Some(Box::new(loader))),
        }
    }

    /// Get the assets, evaluating the loader if needed.
    pub fn get(&self) -> &[PreloadAsset] {
        self.cell.get_or_init(|| {
            let loader = match self.loader.lock() {
                Ok(mut guard) => guard.take(),
                Err(poisoned) => poisoned.into_inner().take(),
            };
            loader.map(|load| load()).unwrap_or_default()
        })
    }

    /// Whether the list has been evaluated.
    pub fn is_evaluated(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl Default for PreloadFiles {
    fn default() -> Self {
        Self::ready(Vec::new())
    }
}

impl fmt::Debug for PreloadFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(assets) => f.debug_tuple("PreloadFiles").field(assets).finish(),
            None => f.write_str("PreloadFiles(<pending>)"),
        }
    }
}

/// Ordered set of CSP sources: insertion order kept, duplicates dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ScriptSrcSet {
    sources: Vec<String>,
}

impl ScriptSrcSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source. Returns `false` if it was already present.
    pub fn insert(&mut self, source: impl Into<String>) -> bool {
        let source = source.into();
        if self.contains(&source) {
            return false;
        }
        self.sources.push(source);
        true
    }

    /// Check membership.
    pub fn contains(&self, source: &str) -> bool {
        self.sources.iter().any(|s| s == source)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(String::as_str)
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sources as a slice.
    pub fn as_slice(&self) -> &[String] {
        &self.sources
    }
}

impl<S: Into<String>> FromIterator<S> for ScriptSrcSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<S: Into<String>> Extend<S> for ScriptSrcSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for source in iter {
            self.insert(source);
        }
    }
}

impl IntoIterator for ScriptSrcSet {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.sources.into_iter()
    }
}

impl From<Vec<String>> for ScriptSrcSet {
    fn from(sources: Vec<String>) -> Self {
        sources.into_iter().collect()
    }
}

impl From<ScriptSrcSet> for Vec<String> {
    fn from(set: ScriptSrcSet) -> Self {
        set.sources
    }
}

/// Redirect issued by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Redirect status (302 unless the route says otherwise).
    pub status: StatusCode,
    /// Target location.
    pub location: String,
}

impl Redirect {
    /// A temporary (302) redirect.
    pub fn found(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FOUND,
            location: location.into(),
        }
    }
}

/// Error page rendered in place of the route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    /// Status requested by the error page, if any.
    pub status: Option<StatusCode>,
    /// Error description.
    pub message: String,
}

impl RenderFailure {
    /// Create a failure with a status code.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Response status, defaulting to 500.
    pub fn status_code(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Output of a single route render.
#[derive(Debug, Default)]
pub struct RenderedResult {
    /// Rendered document.
    pub html: String,
    /// Set when the renderer produced an error page.
    pub error: Option<RenderFailure>,
    /// Set when the route redirected.
    pub redirect: Option<Redirect>,
    /// Hashes of inline scripts, when the renderer collected them.
    pub csp_script_src_hashes: Option<ScriptSrcSet>,
    /// Assets the page references.
    pub preload_files: PreloadFiles,
}

impl RenderedResult {
    /// Create a successful result.
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Default::default()
        }
    }

    /// Attach an error page failure.
    pub fn with_error(mut self, failure: RenderFailure) -> Self {
        self.error = Some(failure);
        self
    }

    /// Attach a redirect.
    pub fn with_redirect(mut self, redirect: Redirect) -> Self {
        self.redirect = Some(redirect);
        self
    }

    /// Attach inline-script hashes.
    pub fn with_script_hashes<I, S>(mut self, hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.csp_script_src_hashes = Some(hashes.into_iter().collect());
        self
    }

    /// Attach the preload asset list.
    pub fn with_preload_files(mut self, files: PreloadFiles) -> Self {
        self.preload_files = files;
        self
    }

    /// Whether the route redirected.
    pub fn redirected(&self) -> bool {
        self.redirect.is_some()
    }

    /// Whether an error page was rendered.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-request state the renderer may update while rendering.
#[derive(Debug)]
pub struct RenderContext {
    /// The request being rendered.
    pub request: RequestContext,
    redirect: Option<Redirect>,
}

impl RenderContext {
    /// Create a render context for a request.
    pub fn new(request: RequestContext) -> Self {
        Self {
            request,
            redirect: None,
        }
    }

    /// Record that the route redirected.
    pub fn redirect(&mut self, redirect: Redirect) {
        self.redirect = Some(redirect);
    }

    /// The recorded redirect, if any.
    pub fn redirect_target(&self) -> Option<&Redirect> {
        self.redirect.as_ref()
    }

    /// Whether a redirect was recorded.
    pub fn redirected(&self) -> bool {
        self.redirect.is_some()
    }
}

/// The page renderer.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render a route to HTML.
    async fn render_route(
        &self,
        url: &str,
        ctx: &mut RenderContext,
    ) -> Result<RenderedResult, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // === AssetType Tests ===

    #[test]
    fn test_asset_type_parse() {
        assert_eq!(AssetType::parse("script"), AssetType::Script);
        assert_eq!(AssetType::parse("style"), AssetType::Style);
        assert_eq!(AssetType::parse("worker"), AssetType::Other("worker".into()));
        assert_eq!(AssetType::parse("worker").as_str(), "worker");
    }

    #[test]
    fn test_asset_type_default_preload() {
        assert!(AssetType::Script.is_preloaded_by_default());
        assert!(AssetType::Style.is_preloaded_by_default());
        assert!(!AssetType::Font.is_preloaded_by_default());
        assert!(!AssetType::Other("script ".into()).is_preloaded_by_default());
    }

    #[test]
    fn test_asset_type_serde() {
        let asset: PreloadAsset = serde_json::from_str(
            r#"{"file":"app.js","as_type":"script","file_without_query":"app.js"}"#,
        )
        .unwrap();
        assert_eq!(asset.as_type, AssetType::Script);
        assert!(!asset.modern);
        let json = serde_json::to_string(&AssetType::Font).unwrap();
        assert_eq!(json, "\"font\"");
    }

    // === PreloadAsset Tests ===

    #[test]
    fn test_preload_asset_strips_query() {
        let asset = PreloadAsset::new("app.js?v=3", AssetType::Script);
        assert_eq!(asset.file, "app.js?v=3");
        assert_eq!(asset.file_without_query, "app.js");
    }

    #[test]
    fn test_preload_asset_without_query() {
        let asset = PreloadAsset::new("vendor.css", AssetType::Style).with_modern(true);
        assert_eq!(asset.file_without_query, "vendor.css");
        assert!(asset.modern);
    }

    // === PreloadFiles Tests ===

    #[test]
    fn test_preload_files_lazy_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let files = PreloadFiles::lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            vec![PreloadAsset::new("app.js", AssetType::Script)]
        });

        assert!(!files.is_evaluated());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(files.get().len(), 1);
        assert_eq!(files.get().len(), 1);
        assert!(files.is_evaluated());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_preload_files_ready() {
        let files = PreloadFiles::ready(vec![PreloadAsset::new("a.css", AssetType::Style)]);
        assert!(files.is_evaluated());
        assert_eq!(files.get()[0].file, "a.css");
        assert!(PreloadFiles::default().get().is_empty());
    }

    // === ScriptSrcSet Tests ===

    #[test]
    fn test_script_src_set_dedupes_in_order() {
        let mut set: ScriptSrcSet = ["b", "a", "b"].into_iter().collect();
        assert_eq!(set.as_slice(), &["b".to_string(), "a".to_string()]);
        assert!(!set.insert("a"));
        assert!(set.insert("c"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_script_src_set_serde_roundtrip_dedupes() {
        let set: ScriptSrcSet = serde_json::from_str(r#"["'self'","'self'","x"]"#).unwrap();
        assert_eq!(set.len(), 2);
    }

    // === RenderedResult Tests ===

    #[test]
    fn test_rendered_result_builders() {
        let result = RenderedResult::new("<html></html>")
            .with_script_hashes(["sha256-AAA="])
            .with_redirect(Redirect::found("/login"));

        assert!(result.redirected());
        assert!(!result.is_error());
        assert_eq!(result.csp_script_src_hashes.unwrap().len(), 1);
    }

    #[test]
    fn test_render_failure_default_status() {
        let failure = RenderFailure {
            status: None,
            message: "oops".into(),
        };
        assert_eq!(failure.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            RenderFailure::new(StatusCode::NOT_FOUND, "missing").status_code(),
            StatusCode::NOT_FOUND
        );
    }

    // === RenderContext Tests ===

    #[test]
    fn test_render_context_redirect() {
        let request = RequestContext::new(http::Method::GET, "/".parse().unwrap());
        let mut ctx = RenderContext::new(request);
        assert!(!ctx.redirected());

        ctx.redirect(Redirect::found("/elsewhere"));
        assert!(ctx.redirected());
        assert_eq!(ctx.redirect_target().unwrap().location, "/elsewhere");
    }
}
