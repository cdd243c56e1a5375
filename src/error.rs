//! Error types
//!
//! Configuration and programmer errors surface to the caller. Provider
//! errors ([`ToolError`]) never leave the executor: they feed the circuit
//! breaker and the performance tracker and are reported as failures in the
//! merged result set.

use crate::results::ResultKind;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`ParallelSearchExecutor::execute`](crate::search::ParallelSearchExecutor::execute)
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("no search tools are registered")]
    NoToolsRegistered,

    #[error("no registered tool produces any of the requested kinds: {kinds:?}")]
    NoToolsForKinds { kinds: Vec<ResultKind> },

    #[error("invalid search options: {0}")]
    InvalidOptions(String),
}

/// Errors raised while registering tools
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("invalid registration for tool '{id}': {reason}")]
    InvalidRegistration { id: String, reason: String },
}

/// A failed adapter call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("tool misconfigured: {0}")]
    Configuration(String),

    #[error("adapter panicked: {0}")]
    Panicked(String),
}

impl ToolError {
    /// Short machine-readable label used in failure records
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Http(_) => "http_error",
            Self::Network(_) => "network_error",
            Self::Parse(_) => "parse_error",
            Self::Configuration(_) => "configuration",
            Self::Panicked(_) => "panic",
        }
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::Http(status.as_u16())
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
