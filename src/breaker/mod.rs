//! Per-tool circuit breaker
//!
//! Tracks consecutive failures per tool and stops dispatching to a tool that
//! keeps failing. After a cool-down the breaker goes half-open and lets a
//! single probe call through; its outcome closes or re-opens the circuit.
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cool-down  ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘  in window    └───▲────┘             └────┬─────┘
//!     │                        │      probe failure    │
//!     │                        └───────────────────────┤
//!     │               probe success                    │
//!     └────────────────────────────────────────────────┘
//! ```
//!
//! Every tool owns its own [`CircuitBreaker`]; there is no lock shared
//! between tools.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Circuit state for a single tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Breaker tuning
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the circuit
    pub failure_threshold: u32,
    /// Sliding window the threshold must be reached within
    pub failure_window: Duration,
    /// Time spent open before a probe is allowed
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    /// Times of the current run of failures still inside the window,
    /// oldest first, at most `failure_threshold` long
    recent_failures: VecDeque<Instant>,
    /// Valid only while open
    opened_at: Option<Instant>,
}

/// Result of asking the breaker whether a call may proceed
#[derive(Debug)]
pub enum Admission {
    /// Circuit closed; call normally
    Allowed,
    /// Circuit half-open and this caller holds the single probe slot
    Probe(ProbeGuard),
    /// Circuit open (or another caller is probing); do not call the tool
    Rejected,
}

impl Admission {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

/// Holds the half-open probe slot; releases it on drop
#[derive(Debug)]
pub struct ProbeGuard {
    breaker: Arc<CircuitBreaker>,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.breaker.probe_in_flight.store(false, Ordering::Release);
    }
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
}

/// Failure-tracking state machine for one tool
#[derive(Debug)]
pub struct CircuitBreaker {
    tool: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
    probe_in_flight: AtomicBool,
}

impl CircuitBreaker {
    pub fn new(tool: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            tool: tool.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                recent_failures: VecDeque::new(),
                opened_at: None,
            }),
            probe_in_flight: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cooldown_elapsed(&self, inner: &BreakerInner, now: Instant) -> bool {
        inner
            .opened_at
            .map_or(true, |at| now.saturating_duration_since(at) >= self.config.cooldown)
    }

    /// Decide whether a call may go out, claiming the probe slot if half-open
    pub fn try_acquire(self: &Arc<Self>) -> Admission {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::Open => {
                if !self.cooldown_elapsed(&inner, Instant::now()) {
                    return Admission::Rejected;
                }
                inner.state = CircuitState::HalfOpen;
                info!(tool = %self.tool, "circuit half-open, allowing probe");
                self.claim_probe()
            }
            CircuitState::HalfOpen => self.claim_probe(),
        }
    }

    fn claim_probe(self: &Arc<Self>) -> Admission {
        match self
            .probe_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Admission::Probe(ProbeGuard {
                breaker: Arc::clone(self),
            }),
            Err(_) => Admission::Rejected,
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            info!(tool = %self.tool, "circuit closed after successful call");
        }
        inner.state = CircuitState::Closed;
        inner.recent_failures.clear();
        inner.opened_at = None;
    }

    /// Record a failed call (error, non-success response, or timeout)
    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut inner = self.lock();
        let threshold = self.config.failure_threshold.max(1) as usize;

        inner.recent_failures.push_back(now);
        while let Some(&oldest) = inner.recent_failures.front() {
            let expired = now.saturating_duration_since(oldest) > self.config.failure_window;
            if expired || inner.recent_failures.len() > threshold {
                inner.recent_failures.pop_front();
            } else {
                break;
            }
        }

        let trip = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.recent_failures.len() >= threshold,
            CircuitState::Open => false,
        };

        if trip {
            warn!(
                tool = %self.tool,
                failures = inner.recent_failures.len(),
                cooldown_secs = self.config.cooldown.as_secs_f64(),
                "circuit opened"
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
        }
    }

    /// True when a call would be rejected right now. Does not transition.
    pub fn is_open(&self) -> bool {
        let inner = self.lock();
        match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => !self.cooldown_elapsed(&inner, Instant::now()),
            CircuitState::HalfOpen => self.probe_in_flight.load(Ordering::Acquire),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.recent_failures.len() as u32,
        }
    }
}

/// Process-wide map of tool name to its breaker
#[derive(Debug, Default)]
pub struct BreakerBoard {
    config: BreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerBoard {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Get the breaker for a tool, creating a closed one on first use
    pub fn breaker(&self, tool: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self
            .breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tool)
        {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write().unwrap_or_else(PoisonError::into_inner);
        breakers
            .entry(tool.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(tool, self.config.clone())))
            .clone()
    }

    /// Current state of a tool's breaker (closed if never seen)
    pub fn state(&self, tool: &str) -> CircuitState {
        self.breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tool)
            .map_or(CircuitState::Closed, |b| b.state())
    }
}
