//! Request lifecycle tracking.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle phases of a finalized request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Request received, rendering started.
    Start,
    /// The renderer returned a result.
    Rendered,
    /// The render issued a redirect; finalization stopped early.
    Redirected,
    /// The client copy is fresh; a 304 was sent.
    NotModified,
    /// The page response was sent.
    Completion,
    /// An error occurred.
    Error(String),
}

impl LifecyclePhase {
    /// Short name used as a timing mark and log field.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Rendered => "rendered",
            Self::Redirected => "redirected",
            Self::NotModified => "not_modified",
            Self::Completion => "completion",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(reason) => write!(f, "error: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Timing context for observability.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    marks: HashMap<String, Instant>,
}

impl TimingContext {
    /// Create a new timing context.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a timing mark.
    pub fn mark(&mut self, name: &str) {
        self.marks.insert(name.to_string(), Instant::now());
    }

    /// Record the mark for a lifecycle phase.
    pub fn mark_phase(&mut self, phase: &LifecyclePhase) {
        self.mark(phase.as_str());
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time from start to a recorded mark.
    pub fn since_start(&self, name: &str) -> Option<Duration> {
        self.marks.get(name).map(|t| t.duration_since(self.start))
    }

    /// Time spent in the renderer.
    pub fn render_time(&self) -> Option<Duration> {
        self.since_start(LifecyclePhase::Rendered.as_str())
    }

    /// Check whether a mark was recorded.
    pub fn has_mark(&self, name: &str) -> bool {
        self.marks.contains_key(name)
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}
