//! Tool traits and registration types

use crate::error::{RegistryError, ToolError};
use crate::results::{ResultKind, SearchResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Uniform interface over one external search provider.
///
/// Implementations must be cancel-safe: the executor drops the returned
/// future when the call is cancelled, which must abort any network I/O in
/// flight. Timeout, weight and priority live in the [`ToolRegistration`],
/// not in the adapter.
#[async_trait]
pub trait SearchTool: Send + Sync {
    /// Provider name, used as the default registration identity
    fn name(&self) -> &str;

    /// Kinds of results this provider returns
    fn kinds(&self) -> Vec<ResultKind> {
        vec![ResultKind::Text]
    }

    /// Search the provider, returning at most `max_results` results
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, ToolError>;
}

/// Dispatch priority. `Critical > High > Medium > Low > Fallback`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SearchPriority {
    Fallback,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl SearchPriority {
    /// All priorities, highest first
    pub const DESCENDING: [SearchPriority; 5] = [
        SearchPriority::Critical,
        SearchPriority::High,
        SearchPriority::Medium,
        SearchPriority::Low,
        SearchPriority::Fallback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for SearchPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool together with its dispatch configuration. Immutable once
/// registered.
#[derive(Clone)]
pub struct ToolRegistration {
    /// Unique identity
    pub id: String,
    pub tool: Arc<dyn SearchTool>,
    pub priority: SearchPriority,
    /// Configured (maximum) timeout
    pub timeout: Duration,
    pub max_results: usize,
    /// Ranking weight, > 0
    pub weight: f64,
}

impl ToolRegistration {
    /// Register `tool` under its own name with default timeout (5s), weight
    /// (1.0) and result cap (10)
    pub fn new(tool: Arc<dyn SearchTool>, priority: SearchPriority) -> Self {
        Self {
            id: tool.name().to_string(),
            tool,
            priority,
            timeout: Duration::from_secs(5),
            max_results: 10,
            weight: 1.0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// True if the tool returns at least one of `kinds` (or `kinds` is empty)
    pub fn produces_any(&self, kinds: &[ResultKind]) -> bool {
        kinds.is_empty() || self.tool.kinds().iter().any(|k| kinds.contains(k))
    }

    pub(crate) fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidRegistration {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("identity must not be empty"));
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(invalid("weight must be a positive number"));
        }
        if self.timeout.is_zero() {
            return Err(invalid("timeout must be greater than zero"));
        }
        Ok(())
    }
}

impl fmt::Debug for ToolRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistration")
            .field("id", &self.id)
            .field("tool", &self.tool.name())
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("max_results", &self.max_results)
            .field("weight", &self.weight)
            .finish()
    }
}
