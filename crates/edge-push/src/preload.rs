//! Preload asset selection and `Link` entry formatting.

use std::fmt;
use std::sync::Arc;

use edge_core::{AssetType, PreloadAsset, RequestContext};
use edge_observability::DeprecationNotices;
use serde::{Deserialize, Serialize};

/// Deprecation key for the `should_push` predicate.
pub const SHOULD_PUSH_DEPRECATION: &str = "http2.should_push";

const SHOULD_PUSH_MESSAGE: &str = "http2.should_push is deprecated, use http2.push_assets";

/// Predicate deciding whether an asset is preloaded.
///
/// Called with the file path without query string and the asset type.
#[derive(Clone)]
pub struct ShouldPush(Arc<dyn Fn(&str, &AssetType) -> bool + Send + Sync>);

impl ShouldPush {
    /// Wrap a predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&str, &AssetType) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// Evaluate the predicate.
    pub fn call(&self, file_without_query: &str, as_type: &AssetType) -> bool {
        (self.0)(file_without_query, as_type)
    }
}

impl fmt::Debug for ShouldPush {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ShouldPush(..)")
    }
}

/// Custom replacement for the default preload selection.
pub trait PushAssets: Send + Sync {
    /// Produce the `Link` entries for a request.
    fn push_assets(
        &self,
        request: &RequestContext,
        public_path: &str,
        files: &[PreloadAsset],
    ) -> Vec<String>;
}

impl<F> PushAssets for F
where
    F: Fn(&RequestContext, &str, &[PreloadAsset]) -> Vec<String> + Send + Sync,
{
    fn push_assets(
        &self,
        request: &RequestContext,
        public_path: &str,
        files: &[PreloadAsset],
    ) -> Vec<String> {
        self(request, public_path, files)
    }
}

/// HTTP/2 push configuration.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Http2Options {
    /// Whether `Link` preload headers are emitted.
    pub push: bool,
    /// Deprecated per-asset predicate.
    #[serde(skip)]
    pub should_push: Option<ShouldPush>,
    /// Full replacement for the default selection.
    #[serde(skip)]
    pub push_assets: Option<Arc<dyn PushAssets>>,
}

impl Http2Options {
    /// Push enabled with the default selection.
    pub fn enabled() -> Self {
        Self {
            push: true,
            ..Self::default()
        }
    }

    /// Set the per-asset predicate.
    pub fn with_should_push<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str, &AssetType) -> bool + Send + Sync + 'static,
    {
        self.should_push = Some(ShouldPush::new(predicate));
        self
    }

    /// Set a custom selection.
    pub fn with_push_assets(mut self, push_assets: impl PushAssets + 'static) -> Self {
        self.push_assets = Some(Arc::new(push_assets));
        self
    }

    /// Build the `Link` entries for a request.
    ///
    /// A custom `push_assets` wins over the default selection.
    pub fn links(
        &self,
        request: &RequestContext,
        public_path: &str,
        files: &[PreloadAsset],
        crossorigin: Option<&str>,
        dev: bool,
    ) -> Vec<String> {
        if let Some(custom) = &self.push_assets {
            return custom.push_assets(request, public_path, files);
        }

        PreloadSelector::new(public_path)
            .with_should_push(self.should_push.as_ref())
            .with_crossorigin(crossorigin)
            .dev(dev)
            .select(files)
    }
}

impl fmt::Debug for Http2Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Http2Options")
            .field("push", &self.push)
            .field("should_push", &self.should_push)
            .field("push_assets", &self.push_assets.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Default preload selection.
///
/// Without a predicate only `script` and `style` assets are kept; with one,
/// exactly the assets it accepts. Input order is preserved.
#[derive(Debug, Clone, Copy)]
pub struct PreloadSelector<'a> {
    public_path: &'a str,
    should_push: Option<&'a ShouldPush>,
    crossorigin: Option<&'a str>,
    dev: bool,
    notices: &'a DeprecationNotices,
}

impl<'a> PreloadSelector<'a> {
    /// Create a selector for assets served under `public_path`.
    pub fn new(public_path: &'a str) -> Self {
        Self {
            public_path,
            should_push: None,
            crossorigin: None,
            dev: false,
            notices: DeprecationNotices::global(),
        }
    }

    /// Use a predicate instead of type-based filtering.
    pub fn with_should_push(mut self, should_push: Option<&'a ShouldPush>) -> Self {
        self.should_push = should_push;
        self
    }

    /// Add `crossorigin=<value>` to every entry.
    pub fn with_crossorigin(mut self, crossorigin: Option<&'a str>) -> Self {
        self.crossorigin = crossorigin;
        self
    }

    /// Development mode.
    pub fn dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    /// Report deprecations to a specific registry.
    pub fn with_notices(mut self, notices: &'a DeprecationNotices) -> Self {
        self.notices = notices;
        self
    }

    /// Check whether an asset is preloaded.
    pub fn includes(&self, asset: &PreloadAsset) -> bool {
        match self.should_push {
            Some(predicate) => predicate.call(&asset.file_without_query, &asset.as_type),
            None => asset.as_type.is_preloaded_by_default(),
        }
    }

    /// Select and format the `Link` entries.
    pub fn select(&self, assets: &[PreloadAsset]) -> Vec<String> {
        if self.should_push.is_some() && self.dev {
            self.notices
                .warn_once(SHOULD_PUSH_DEPRECATION, SHOULD_PUSH_MESSAGE);
        }

        assets
            .iter()
            .filter(|asset| self.includes(asset))
            .map(|asset| format_link(self.public_path, asset, self.crossorigin))
            .collect()
    }
}

/// Format one `Link` entry.
///
/// `<{public_path}{file}>; rel=preload; as={type}`, with `rel=modulepreload`
/// for modern scripts and ` crossorigin={value};` before `as` when set.
pub fn format_link(public_path: &str, asset: &PreloadAsset, crossorigin: Option<&str>) -> String {
    let rel = if asset.modern && asset.as_type == AssetType::Script {
        "modulepreload"
    } else {
        "preload"
    };
    let cors = crossorigin
        .map(|value| format!(" crossorigin={};", value))
        .unwrap_or_default();

    format!(
        "<{}{}>; rel={};{} as={}",
        public_path, asset.file, rel, cors, asset.as_type
    )
}

/// Join entries into a single `Link` header value.
pub fn link_header_value(links: &[String]) -> Option<String> {
    if links.is_empty() {
        None
    } else {
        Some(links.join(", "))
    }
}
