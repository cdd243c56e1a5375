//! Result types and the merger that fuses them
//!
//! Tool adapters produce [`SearchResult`]s; the [`ResultMerger`] deduplicates
//! them by normalized URL and ranks them into a [`MergedResultSet`].

mod merger;
mod normalize;
mod types;

pub use merger::{ResultMerger, ToolBatch};
pub use normalize::normalize_url;
pub use types::*;
