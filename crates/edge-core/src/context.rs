//! Request context passed through rendering and finalization.

use std::sync::atomic::{AtomicU64, Ordering};

use http::header::AsHeaderName;
use http::{HeaderMap, Method, Request, Uri};

use crate::error::RenderError;
use crate::lifecycle::TimingContext;

/// Header carrying an upstream request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Unique request identifier for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        static SEQUENCE: AtomicU64 = AtomicU64::new(0);

        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self(format!("{:x}-{:x}", nanos, seq))
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request metadata shared by the renderer and the response finalizer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique request identifier.
    pub request_id: RequestId,
    /// HTTP method.
    pub method: Method,
    /// Request URI.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
    /// Timing context for observability.
    pub timing: TimingContext,
}

impl RequestContext {
    /// Create a new request context.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            request_id: RequestId::generate(),
            method,
            uri,
            headers: HeaderMap::new(),
            timing: TimingContext::new(),
        }
    }

    /// Capture the metadata of an incoming request.
    ///
    /// An upstream `x-request-id` header is reused as the request ID.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(RequestId::from_string)
            .unwrap_or_else(RequestId::generate);

        Self {
            request_id,
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
            timing: TimingContext::new(),
        }
    }

    /// Request path.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Get a header value as a string.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Path and query, percent-decoded.
    ///
    /// Escapes of reserved characters (`;/?:@&=+$,#`) stay encoded so the
    /// decoded URL keeps the request's structure. Fails on malformed escapes
    /// or escapes that decode to invalid UTF-8.
    pub fn normalized_url(&self) -> Result<String, RenderError> {
        let raw = match self.uri.query() {
            Some(query) => format!("{}?{}", self.uri.path(), query),
            None => self.uri.path().to_string(),
        };
        decode_uri(&raw)
    }
}

const RESERVED: &[u8] = b";/?:@&=+$,#";

fn decode_uri(raw: &str) -> Result<String, RenderError> {
    let invalid = || RenderError::InvalidUri(raw.to_string());
    let bytes = raw.as_bytes();
    let mut decoded = String::with_capacity(raw.len());
    let mut chunk_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        let byte = bytes
            .get(i + 1..i + 3)
            .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .ok_or_else(invalid)?;

        if RESERVED.contains(&byte) {
            decoded.push_str(&decode_chunk(&raw[chunk_start..i]).ok_or_else(invalid)?);
            decoded.push_str(&raw[i..i + 3]);
            chunk_start = i + 3;
        }
        i += 3;
    }

    decoded.push_str(&decode_chunk(&raw[chunk_start..]).ok_or_else(invalid)?);
    Ok(decoded)
}

// A reserved escape is ASCII, so a multi-byte sequence split by one fails here.
fn decode_chunk(chunk: &str) -> Option<String> {
    urlencoding::decode(chunk).ok().map(|decoded| decoded.into_owned())
}
