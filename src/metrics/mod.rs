//! Performance tracking
//!
//! Rolling per-tool statistics shared by every search in the process. The
//! store is created once at startup and injected into the executor. It is
//! never reset implicitly; [`PerformanceTracker::reset`] exists for
//! operators.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// Tuning for the exponentially-weighted averages
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Weight of the newest observation (0.0-1.0)
    pub alpha: f64,
    /// Effective timeout is this multiple of the mean latency
    pub timeout_multiplier: f64,
    /// Lower bound on the effective timeout
    pub min_timeout_floor: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            timeout_multiplier: 3.0,
            min_timeout_floor: Duration::from_secs(1),
        }
    }
}

/// Statistics for a single tool
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceStats {
    /// Exponentially-weighted mean latency in milliseconds
    pub ewma_latency_ms: f64,
    /// Exponentially-weighted success rate (0.0-1.0)
    pub ewma_success_rate: f64,
    /// Number of attempted calls observed
    pub samples: u64,
}

impl Default for PerformanceStats {
    fn default() -> Self {
        Self {
            ewma_latency_ms: 0.0,
            ewma_success_rate: 1.0,
            samples: 0,
        }
    }
}

impl PerformanceStats {
    fn observe(&mut self, alpha: f64, latency: Duration, success: bool) {
        let latency_ms = latency.as_secs_f64() * 1000.0;
        let outcome = if success { 1.0 } else { 0.0 };

        if self.samples == 0 {
            // First observation seeds the latency average.
            self.ewma_latency_ms = latency_ms;
        } else {
            self.ewma_latency_ms = alpha * latency_ms + (1.0 - alpha) * self.ewma_latency_ms;
        }
        self.ewma_success_rate = alpha * outcome + (1.0 - alpha) * self.ewma_success_rate;
        self.samples += 1;
    }
}

/// Process-wide store of per-tool statistics.
///
/// Each tool's stats sit behind their own mutex; the outer map lock is only
/// written when a tool is seen for the first time.
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    config: TrackerConfig,
    tools: RwLock<HashMap<String, Arc<Mutex<PerformanceStats>>>>,
}

impl PerformanceTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tools: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn entry(&self, tool: &str) -> Arc<Mutex<PerformanceStats>> {
        if let Some(stats) = self
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tool)
        {
            return Arc::clone(stats);
        }

        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        tools.entry(tool.to_string()).or_default().clone()
    }

    /// Record one attempted call
    pub fn record(&self, tool: &str, latency: Duration, success: bool) {
        let entry = self.entry(tool);
        let mut stats = entry.lock().unwrap_or_else(PoisonError::into_inner);
        stats.observe(self.config.alpha, latency, success);
    }

    /// Current stats for a tool (neutral defaults if never seen)
    pub fn stats(&self, tool: &str) -> PerformanceStats {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tool)
            .map(|s| s.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .unwrap_or_default()
    }

    /// Timeout for the next call:
    /// `min(configured, max(ewma_latency * multiplier, floor))`
    pub fn effective_timeout(&self, tool: &str, configured: Duration) -> Duration {
        let stats = self.stats(tool);
        let secs = (stats.ewma_latency_ms * self.config.timeout_multiplier / 1000.0).max(0.0);
        match Duration::try_from_secs_f64(secs) {
            Ok(adaptive) => configured.min(adaptive.max(self.config.min_timeout_floor)),
            // Overflowing or NaN estimates leave the configured timeout in charge
            Err(_) => configured,
        }
    }

    /// Forget everything recorded so far
    pub fn reset(&self) {
        self.tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
