//! Settings structures for parallel-search configuration

use crate::breaker::BreakerConfig;
use crate::metrics::TrackerConfig;
use crate::tools::SearchPriority;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main settings structure, loaded from `settings.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub executor: ExecutorSettings,
    pub breaker: BreakerSettings,
    pub tracker: TrackerSettings,
    pub outgoing: OutgoingSettings,
    pub tools: ToolList,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Merge with environment variables (PSEARCH_* prefix)
    pub fn merge_env(&mut self) {
        self.merge_vars(|key| std::env::var(key).ok());
    }

    fn merge_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(budget) = var("PSEARCH_BUDGET_MS").and_then(|v| v.parse().ok()) {
            self.executor.budget_ms = budget;
        }
        if let Some(min) = var("PSEARCH_MIN_RESULTS").and_then(|v| v.parse().ok()) {
            self.executor.min_results = min;
        }
        if let Some(cap) = var("PSEARCH_MAX_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.executor.max_concurrency = cap;
        }
        if let Some(key) = var("SERPER_API_KEY").filter(|k| !k.is_empty()) {
            for tool in self.tools.0.iter_mut().filter(|t| t.tool.starts_with("serper")) {
                if tool.api_key.is_none() {
                    tool.api_key = Some(key.clone());
                }
            }
        }
    }

    /// Get tool config by name
    pub fn get_tool(&self, name: &str) -> Option<&ToolConfig> {
        self.tools.0.iter().find(|t| t.name == name)
    }

    /// Get all enabled tools
    pub fn enabled_tools(&self) -> Vec<&ToolConfig> {
        self.tools.0.iter().filter(|t| !t.disabled).collect()
    }
}

/// Executor behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Default overall budget per call
    pub budget_ms: u64,
    /// Default sufficiency threshold
    pub min_results: usize,
    /// Default cap on returned results
    pub max_results: usize,
    /// Concurrent outbound adapter calls across the process
    pub max_concurrency: usize,
    /// How long to wait for cancelled workers before merging
    pub cancellation_grace_ms: u64,
    /// Skip lower tiers once enough results are in
    pub skip_lower_tiers_when_sufficient: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            budget_ms: 8000,
            min_results: 5,
            max_results: 20,
            max_concurrency: 32,
            cancellation_grace_ms: 200,
            skip_lower_tiers_when_sufficient: true,
        }
    }
}

impl ExecutorSettings {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    pub fn cancellation_grace(&self) -> Duration {
        Duration::from_millis(self.cancellation_grace_ms)
    }
}

/// Circuit breaker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub failure_window_secs: u64,
    pub cooldown_secs: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            failure_window_secs: 60,
            cooldown_secs: 30,
        }
    }
}

impl From<&BreakerSettings> for BreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold.max(1),
            failure_window: Duration::from_secs(settings.failure_window_secs),
            cooldown: Duration::from_secs(settings.cooldown_secs),
        }
    }
}

/// Performance tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// EWMA weight of the newest observation
    pub alpha: f64,
    pub timeout_multiplier: f64,
    /// Lower bound on a tool's effective timeout
    pub min_timeout_floor_ms: u64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            timeout_multiplier: 3.0,
            min_timeout_floor_ms: 1000,
        }
    }
}

impl From<&TrackerSettings> for TrackerConfig {
    fn from(settings: &TrackerSettings) -> Self {
        let defaults = TrackerConfig::default();
        // NaN and infinities fall back to the defaults
        let finite = |value: f64, default: f64| if value.is_finite() { value } else { default };

        Self {
            alpha: finite(settings.alpha, defaults.alpha).clamp(0.0, 1.0),
            timeout_multiplier: finite(settings.timeout_multiplier, defaults.timeout_multiplier)
                .max(0.0),
            min_timeout_floor: Duration::from_millis(settings.min_timeout_floor_ms),
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Hard HTTP timeout in seconds, above any per-tool timeout
    pub request_timeout: f64,
    /// Pool max size
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Proxy settings
    pub proxies: ProxySettings,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 30.0,
            pool_maxsize: 20,
            verify_ssl: true,
            proxies: ProxySettings::default(),
        }
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
    pub all: Option<String>,
}

/// Individual tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Registration identity (unique)
    pub name: String,
    /// Adapter to use
    pub tool: String,
    pub priority: SearchPriority,
    /// Configured (maximum) timeout
    pub timeout_ms: u64,
    /// Ranking weight, must be > 0
    pub weight: f64,
    /// Results requested from the provider
    pub max_results: usize,
    pub disabled: bool,
    /// API key if required
    pub api_key: Option<String>,
    /// Override the provider endpoint
    pub base_url: Option<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            tool: String::new(),
            priority: SearchPriority::Medium,
            timeout_ms: 5000,
            weight: 1.0,
            max_results: 10,
            disabled: false,
            api_key: None,
            base_url: None,
        }
    }
}

impl ToolConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Tool list; defaults to the built-in providers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolList(pub Vec<ToolConfig>);

impl Default for ToolList {
    fn default() -> Self {
        Self(default_tools())
    }
}

/// Default tool configurations
fn default_tools() -> Vec<ToolConfig> {
    vec![
        ToolConfig {
            name: "wikipedia".to_string(),
            tool: "wikipedia".to_string(),
            priority: SearchPriority::Critical,
            timeout_ms: 4000,
            weight: 1.2,
            max_results: 3,
            ..Default::default()
        },
        ToolConfig {
            name: "duckduckgo".to_string(),
            tool: "duckduckgo".to_string(),
            priority: SearchPriority::High,
            timeout_ms: 6000,
            weight: 1.0,
            max_results: 10,
            ..Default::default()
        },
        ToolConfig {
            name: "bing images".to_string(),
            tool: "bing_images".to_string(),
            priority: SearchPriority::Medium,
            timeout_ms: 5000,
            weight: 0.8,
            max_results: 10,
            ..Default::default()
        },
        ToolConfig {
            name: "serper".to_string(),
            tool: "serper".to_string(),
            priority: SearchPriority::Low,
            timeout_ms: 8000,
            weight: 0.9,
            max_results: 5,
            ..Default::default()
        },
        ToolConfig {
            name: "serper videos".to_string(),
            tool: "serper_videos".to_string(),
            priority: SearchPriority::Fallback,
            timeout_ms: 8000,
            weight: 0.6,
            max_results: 5,
            ..Default::default()
        },
    ]
}
