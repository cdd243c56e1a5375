//! parallel-search: tiered, deadline-bounded fan-out over web search providers
//!
//! A query is sent to every registered [`SearchTool`] in priority tiers.
//! Per-tool circuit breakers keep failing providers out of the way, a
//! process-wide performance tracker adapts each tool's timeout to its
//! observed latency, and the results are deduplicated and ranked into one
//! [`MergedResultSet`].

pub mod breaker;
pub mod config;
pub mod error;
pub mod metrics;
pub mod network;
pub mod results;
pub mod search;
pub mod tools;

pub use config::Settings;
pub use error::{RegistryError, SearchError, ToolError};
pub use results::{MergedResultSet, ResultKind, SearchResult};
pub use search::{ParallelSearchExecutor, SearchOptions};
pub use tools::{SearchPriority, SearchTool, ToolRegistration, ToolRegistry};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
