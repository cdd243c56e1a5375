//! Result type definitions

use crate::error::ToolError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single normalized search result produced by a tool adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The title of the result
    pub title: String,
    /// The URL of the result
    pub url: String,
    /// Content snippet/description
    #[serde(default)]
    pub snippet: String,
    /// Tool that returned this result
    pub source_tool: String,
    /// Result kind
    #[serde(default)]
    pub kind: ResultKind,
    /// When the adapter fetched this result
    pub fetched_at: DateTime<Utc>,
    /// Publication time reported by the provider, if any
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Thumbnail or image source (for image and video results)
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Score assigned by the merger
    #[serde(default)]
    pub score: f64,
}

impl SearchResult {
    /// Create a new text result fetched now
    pub fn new(url: impl Into<String>, title: impl Into<String>, source_tool: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: String::new(),
            source_tool: source_tool.into(),
            kind: ResultKind::Text,
            fetched_at: Utc::now(),
            published_at: None,
            thumbnail: None,
            score: 0.0,
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn with_kind(mut self, kind: ResultKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

/// Kind of result
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    #[default]
    Text,
    Image,
    Video,
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Tool response timing information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timing {
    /// Tool name
    pub tool: String,
    /// Response time in milliseconds
    pub time_ms: u64,
    /// Number of results returned
    pub result_count: usize,
}

/// A tool that was attempted but contributed nothing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFailure {
    pub tool: String,
    /// Machine-readable failure label (see [`ToolError::label`])
    pub kind: String,
    pub message: String,
}

impl ToolFailure {
    pub fn new(tool: impl Into<String>, error: &ToolError) -> Self {
        Self {
            tool: tool.into(),
            kind: error.label().to_string(),
            message: error.to_string(),
        }
    }

    /// A call still outstanding when the overall deadline fired
    pub fn cancelled(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            kind: "cancelled".to_string(),
            message: "cancelled at the overall deadline".to_string(),
        }
    }
}

/// Per-call bookkeeping of which tools ran and how they fared
#[derive(Debug, Clone, Default)]
pub struct ExecutionLedger {
    pub tools_attempted: Vec<String>,
    pub tools_succeeded: Vec<String>,
    pub tools_circuit_open: Vec<String>,
    pub tools_skipped: Vec<String>,
    pub timings: Vec<Timing>,
    pub failures: Vec<ToolFailure>,
}

/// The ranked, deduplicated output of one executor call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergedResultSet {
    pub results: Vec<SearchResult>,
    pub execution_time_ms: u64,
    pub tools_attempted: Vec<String>,
    pub tools_succeeded: Vec<String>,
    pub tools_circuit_open: Vec<String>,
    /// Tools not attempted because the deadline had already passed
    pub tools_skipped: Vec<String>,
    pub timings: Vec<Timing>,
    pub failures: Vec<ToolFailure>,
}

impl MergedResultSet {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// URLs of the results, in rank order
    pub fn urls(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.url.as_str()).collect()
    }
}
