//! Tool loader for building the registry from configuration

use super::bing_images::BingImages;
use super::duckduckgo::DuckDuckGo;
use super::registry::ToolRegistry;
use super::serper::SerperTool;
use super::traits::{SearchTool, ToolRegistration};
use super::wikipedia::Wikipedia;
use crate::config::{Settings, ToolConfig};
use crate::network::HttpClient;
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Loader for initializing tools from configuration
pub struct ToolLoader;

impl ToolLoader {
    /// Build a registry from every enabled tool in `settings`.
    ///
    /// Tools that fail to construct are logged and left out; duplicate or
    /// invalid registrations are configuration errors.
    pub fn load(settings: &Settings, client: HttpClient) -> Result<ToolRegistry> {
        let registry = ToolRegistry::new();

        for config in &settings.tools.0 {
            if config.disabled {
                info!("Skipping disabled tool: {}", config.name);
                continue;
            }

            match Self::create_tool(config, client.clone()) {
                Ok(tool) => {
                    registry.register(Self::registration(config, tool))?;
                    info!(
                        "Loaded tool: {} ({}, priority {})",
                        config.name, config.tool, config.priority
                    );
                }
                Err(e) => {
                    warn!("Failed to load tool {}: {}", config.name, e);
                }
            }
        }

        info!("Loaded {} tools", registry.len());
        Ok(registry)
    }

    fn registration(config: &ToolConfig, tool: Arc<dyn SearchTool>) -> ToolRegistration {
        ToolRegistration::new(tool, config.priority)
            .with_id(&config.name)
            .with_timeout(config.timeout())
            .with_max_results(config.max_results)
            .with_weight(config.weight)
    }

    /// Create an adapter instance by tool type
    fn create_tool(config: &ToolConfig, client: HttpClient) -> Result<Arc<dyn SearchTool>> {
        let base_url = config.base_url.clone();

        let tool: Arc<dyn SearchTool> = match config.tool.as_str() {
            "wikipedia" => {
                let tool = Wikipedia::new(client);
                Arc::new(match base_url {
                    Some(url) => tool.with_api_url(url),
                    None => tool,
                })
            }
            "duckduckgo" => {
                let tool = DuckDuckGo::new(client);
                Arc::new(match base_url {
                    Some(url) => tool.with_html_url(url),
                    None => tool,
                })
            }
            "bing_images" => {
                let tool = BingImages::new(client);
                Arc::new(match base_url {
                    Some(url) => tool.with_base_url(url),
                    None => tool,
                })
            }
            "serper" | "serper_videos" => {
                let tool = if config.tool == "serper" {
                    SerperTool::web(client, config.api_key.clone())
                } else {
                    SerperTool::videos(client, config.api_key.clone())
                };
                if !tool.has_api_key() {
                    bail!("{} requires an API key (set SERPER_API_KEY)", config.tool);
                }
                Arc::new(match base_url {
                    Some(url) => tool.with_base_url(url),
                    None => tool,
                })
            }
            other => bail!("Unknown tool type: {}", other),
        };

        Ok(tool)
    }

    /// Get list of available tool types
    pub fn available_tools() -> Vec<&'static str> {
        vec!["wikipedia", "duckduckgo", "bing_images", "serper", "serper_videos"]
    }
}
