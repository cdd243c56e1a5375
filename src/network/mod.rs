//! HTTP networking module
//!
//! Provides the HTTP client the provider adapters use to reach their
//! search backends.

mod client;
mod user_agent;

pub use client::{HttpClient, HttpMethod, RequestBody, ToolRequest, ToolResponse};
pub use user_agent::{generate_user_agent, Accept};
