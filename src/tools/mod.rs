//! Search tool module
//!
//! Defines the [`SearchTool`] trait, the registry that groups tools by
//! priority, and the built-in provider adapters.

mod loader;
mod registry;
mod traits;

// Adapter implementations
pub mod bing_images;
pub mod duckduckgo;
pub mod serper;
pub mod wikipedia;

pub use loader::ToolLoader;
pub use registry::{RegistrySnapshot, ToolRegistry};
pub use traits::*;
