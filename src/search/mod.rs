//! Search orchestration module
//!
//! Dispatches a query to the registered tools tier by tier, enforces the
//! overall deadline, and hands what arrived to the merger.

mod executor;
mod models;

pub use executor::{
    ParallelSearchExecutor, ToolStats, DEFAULT_CANCELLATION_GRACE, DEFAULT_MAX_CONCURRENCY,
};
pub use models::*;
