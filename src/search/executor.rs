//! Tiered parallel search execution
//!
//! One call runs in waves:
//!
//! 1. CRITICAL and HIGH tools are dispatched together. CRITICAL tools are
//!    mandatory and are waited on for their full effective timeout, even past
//!    the overall deadline; everything else is bounded by the deadline.
//! 2. If fewer than `min_results` usable results arrived (distinct URLs of a
//!    requested kind), MEDIUM and LOW tools are dispatched together.
//! 3. FALLBACK tools run only when no tool has produced a single usable
//!    result.
//!
//! Workers in a wave share one cancellation token. When the wave's wait
//! expires, outstanding workers are cancelled, given a short grace period,
//! then aborted. Provider failures never surface as errors; they feed the
//! circuit breaker and the performance tracker and are listed in the merged
//! result set.

use super::models::{ExecutionPhase, SearchOptions};
use crate::breaker::{Admission, BreakerBoard, CircuitBreaker, CircuitState};
use crate::config::Settings;
use crate::error::{SearchError, ToolError};
use crate::metrics::{PerformanceTracker, TrackerConfig};
use crate::results::{ExecutionLedger, MergedResultSet, ResultMerger, SearchResult, Timing, ToolFailure};
use crate::tools::{SearchPriority, ToolRegistration, ToolRegistry};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, info, info_span, warn, Instrument};

/// Default cap on concurrent outbound adapter calls
pub const DEFAULT_MAX_CONCURRENCY: usize = 32;

/// Default wait for cancelled workers before merging
pub const DEFAULT_CANCELLATION_GRACE: Duration = Duration::from_millis(200);

/// Operator-facing view of one registered tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolStats {
    pub tool: String,
    pub priority: SearchPriority,
    pub ewma_latency_ms: f64,
    pub success_rate: f64,
    pub samples: u64,
    pub circuit: CircuitState,
    pub consecutive_failures: u32,
}

/// Executes a query across the registered tools in priority tiers.
///
/// The breaker board, the performance tracker and the concurrency limiter
/// are process-wide and injected, so several executors (or tests) can share
/// or isolate them.
pub struct ParallelSearchExecutor {
    registry: Arc<ToolRegistry>,
    breakers: Arc<BreakerBoard>,
    tracker: Arc<PerformanceTracker>,
    permits: Arc<Semaphore>,
    cancellation_grace: Duration,
}

impl ParallelSearchExecutor {
    /// Create an executor with the default concurrency cap and grace period
    pub fn new(
        registry: Arc<ToolRegistry>,
        breakers: Arc<BreakerBoard>,
        tracker: Arc<PerformanceTracker>,
    ) -> Self {
        Self {
            registry,
            breakers,
            tracker,
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
            cancellation_grace: DEFAULT_CANCELLATION_GRACE,
        }
    }

    /// Build an executor with fresh breaker and tracker state from settings
    pub fn from_settings(settings: &Settings, registry: ToolRegistry) -> Self {
        Self::new(
            Arc::new(registry),
            Arc::new(BreakerBoard::new((&settings.breaker).into())),
            Arc::new(PerformanceTracker::new(TrackerConfig::from(&settings.tracker))),
        )
        .with_max_concurrency(settings.executor.max_concurrency)
        .with_cancellation_grace(settings.executor.cancellation_grace())
    }

    /// Cap concurrent adapter calls made through this executor
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max_concurrency.max(1)));
        self
    }

    /// Share a concurrency limiter with other executors
    pub fn with_limiter(mut self, permits: Arc<Semaphore>) -> Self {
        self.permits = permits;
        self
    }

    pub fn with_cancellation_grace(mut self, grace: Duration) -> Self {
        self.cancellation_grace = grace;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn breakers(&self) -> &Arc<BreakerBoard> {
        &self.breakers
    }

    pub fn tracker(&self) -> &Arc<PerformanceTracker> {
        &self.tracker
    }

    /// Run `query` against the registered tools.
    ///
    /// Fails only for caller errors: an empty query, invalid options, or no
    /// registered tool able to serve the request. Total provider failure
    /// yields an empty [`MergedResultSet`].
    pub async fn execute(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<MergedResultSet, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        options.validate()?;

        let snapshot = self.registry.snapshot();
        if snapshot.is_empty() {
            return Err(SearchError::NoToolsRegistered);
        }

        let candidates: Vec<Arc<ToolRegistration>> = snapshot
            .iter()
            .filter(|t| t.produces_any(&options.kinds))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(SearchError::NoToolsForKinds {
                kinds: options.kinds.clone(),
            });
        }

        let span = info_span!(
            "execute",
            query = %query,
            budget_ms = options.budget.as_millis() as u64,
            tools = candidates.len()
        );
        Ok(self.run(query, options, candidates).instrument(span).await)
    }

    async fn run(
        &self,
        query: &str,
        options: &SearchOptions,
        candidates: Vec<Arc<ToolRegistration>>,
    ) -> MergedResultSet {
        let started = Instant::now();
        let deadline = started + options.budget;

        let mut merger = ResultMerger::new(options.max_results)
            .with_kinds(options.kinds.iter().copied().collect());
        if let Some(half_life) = options.recency_half_life {
            merger = merger.with_recency_bias(half_life);
        }
        let mut ledger = ExecutionLedger::default();

        if candidates.iter().all(|t| self.breakers.breaker(&t.id).is_open()) {
            info!("every circuit is open, returning an empty result set");
            ledger.tools_circuit_open = candidates.iter().map(|t| t.id.clone()).collect();
            return self.finish(merger, ledger, started);
        }

        enter(ExecutionPhase::DispatchingCritical);
        let critical = self.tier(&candidates, &[SearchPriority::Critical]);
        enter(ExecutionPhase::DispatchingHigh);
        let high = self.tier(&candidates, &[SearchPriority::High]);
        self.run_wave(query, &critical, &high, deadline, &mut merger, &mut ledger)
            .await;

        let sufficient = options.skip_lower_tiers_when_sufficient
            && merger.usable_count() >= options.min_results;
        if sufficient {
            debug!(
                results = merger.usable_count(),
                min_results = options.min_results,
                "enough results, skipping lower tiers"
            );
        } else {
            enter(ExecutionPhase::DispatchingMediumLow);
            let medium_low =
                self.tier(&candidates, &[SearchPriority::Medium, SearchPriority::Low]);
            self.run_wave(query, &[], &medium_low, deadline, &mut merger, &mut ledger)
                .await;
        }

        if merger.usable_count() == 0 {
            let fallback = self.tier(&candidates, &[SearchPriority::Fallback]);
            if !fallback.is_empty() {
                debug!("no results so far, dispatching fallback tools");
                self.run_wave(query, &[], &fallback, deadline, &mut merger, &mut ledger)
                    .await;
            }
        }

        self.finish(merger, ledger, started)
    }

    fn finish(
        &self,
        merger: ResultMerger,
        ledger: ExecutionLedger,
        started: Instant,
    ) -> MergedResultSet {
        enter(ExecutionPhase::Merging);
        let merged = merger.finish(ledger, started.elapsed());
        enter(ExecutionPhase::Done);

        info!(
            results = merged.len(),
            attempted = merged.tools_attempted.len(),
            succeeded = merged.tools_succeeded.len(),
            circuit_open = merged.tools_circuit_open.len(),
            elapsed_ms = merged.execution_time_ms,
            "search finished"
        );
        merged
    }

    /// Tools of the given priorities, most reliable first. The sort is
    /// stable, so equally reliable tools keep registration order.
    fn tier(
        &self,
        candidates: &[Arc<ToolRegistration>],
        priorities: &[SearchPriority],
    ) -> Vec<Arc<ToolRegistration>> {
        let mut tools: Vec<(f64, Arc<ToolRegistration>)> = candidates
            .iter()
            .filter(|t| priorities.contains(&t.priority))
            .map(|t| (self.tracker.stats(&t.id).ewma_success_rate, t.clone()))
            .collect();
        tools.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        tools.into_iter().map(|(_, t)| t).collect()
    }

    /// Dispatch one wave and collect whatever arrives in time.
    ///
    /// `mandatory` tools extend the wait to their full effective timeout;
    /// `bounded` tools are clipped to the overall deadline.
    async fn run_wave(
        &self,
        query: &str,
        mandatory: &[Arc<ToolRegistration>],
        bounded: &[Arc<ToolRegistration>],
        deadline: Instant,
        merger: &mut ResultMerger,
        ledger: &mut ExecutionLedger,
    ) {
        if mandatory.is_empty() && bounded.is_empty() {
            return;
        }

        let cancel = CancellationToken::new();
        let mut workers = JoinSet::new();
        let mut pending: HashSet<String> = HashSet::new();
        let mut wait_until = deadline;

        let tools = mandatory
            .iter()
            .map(|t| (t, true))
            .chain(bounded.iter().map(|t| (t, false)));

        for (registration, is_mandatory) in tools {
            let now = Instant::now();
            if now >= deadline {
                debug!(tool = %registration.id, "deadline passed, not attempting");
                ledger.tools_skipped.push(registration.id.clone());
                continue;
            }

            let breaker = self.breakers.breaker(&registration.id);
            let admission = breaker.try_acquire();
            if admission.is_rejected() {
                debug!(tool = %registration.id, "circuit open, skipping");
                ledger.tools_circuit_open.push(registration.id.clone());
                continue;
            }

            let mut call_timeout = self
                .tracker
                .effective_timeout(&registration.id, registration.timeout);
            if is_mandatory {
                wait_until = wait_until.max(now + call_timeout);
            } else {
                call_timeout = call_timeout.min(deadline - now);
            }

            debug!(
                tool = %registration.id,
                priority = %registration.priority,
                timeout_ms = call_timeout.as_millis() as u64,
                "dispatching"
            );
            ledger.tools_attempted.push(registration.id.clone());
            pending.insert(registration.id.clone());

            let worker = Worker {
                registration: registration.clone(),
                breaker,
                tracker: self.tracker.clone(),
                permits: self.permits.clone(),
                timeout: call_timeout,
            };
            let span = debug_span!("tool", tool = %registration.id);
            workers.spawn(
                worker
                    .run(query.to_string(), admission, cancel.clone())
                    .instrument(span),
            );
        }

        if workers.is_empty() {
            return;
        }

        enter(ExecutionPhase::Awaiting);
        let expired = {
            let wait = sleep_until(wait_until);
            tokio::pin!(wait);
            loop {
                tokio::select! {
                    joined = workers.join_next() => match joined {
                        Some(Ok(report)) => accept(report, merger, ledger, &mut pending),
                        Some(Err(e)) => warn!("search worker failed: {}", e),
                        None => break false,
                    },
                    _ = &mut wait => break true,
                }
            }
        };

        if expired {
            debug!(outstanding = workers.len(), "wave wait expired, cancelling workers");
            cancel.cancel();

            let grace = sleep(self.cancellation_grace);
            tokio::pin!(grace);
            loop {
                tokio::select! {
                    joined = workers.join_next() => match joined {
                        Some(Ok(report)) => accept(report, merger, ledger, &mut pending),
                        Some(Err(e)) => warn!("search worker failed: {}", e),
                        None => break,
                    },
                    _ = &mut grace => break,
                }
            }
            workers.abort_all();
        }

        // Whatever is still pending was cancelled or its task was lost.
        let mut leftover: Vec<String> = pending.into_iter().collect();
        leftover.sort();
        for tool in leftover {
            if expired {
                ledger.failures.push(ToolFailure::cancelled(tool));
            } else {
                ledger.failures.push(ToolFailure {
                    tool,
                    kind: "lost".to_string(),
                    message: "worker exited without reporting".to_string(),
                });
            }
        }
    }

    /// Current statistics of every registered tool, highest priority first
    pub fn tool_stats(&self) -> Vec<ToolStats> {
        self.registry
            .list_by_priority()
            .into_iter()
            .flat_map(|(_, tools)| tools)
            .map(|registration| {
                let stats = self.tracker.stats(&registration.id);
                let breaker = self.breakers.breaker(&registration.id).snapshot();
                ToolStats {
                    tool: registration.id.clone(),
                    priority: registration.priority,
                    ewma_latency_ms: stats.ewma_latency_ms,
                    success_rate: stats.ewma_success_rate,
                    samples: stats.samples,
                    circuit: breaker.state,
                    consecutive_failures: breaker.consecutive_failures,
                }
            })
            .collect()
    }
}

fn enter(phase: ExecutionPhase) {
    debug!(phase = %phase, "phase");
}

/// Fold one worker's report into the call's merger and ledger
fn accept(
    report: Report,
    merger: &mut ResultMerger,
    ledger: &mut ExecutionLedger,
    pending: &mut HashSet<String>,
) {
    pending.remove(&report.tool);

    match report.outcome {
        Outcome::Completed(results) => {
            debug!(
                tool = %report.tool,
                results = results.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "tool responded"
            );
            ledger.timings.push(Timing {
                tool: report.tool.clone(),
                time_ms: report.elapsed.as_millis() as u64,
                result_count: results.len(),
            });
            ledger.tools_succeeded.push(report.tool.clone());
            merger.add_batch(report.tool, report.weight, results);
        }
        Outcome::Failed(error) => {
            warn!(tool = %report.tool, error = %error, "tool failed");
            ledger.failures.push(ToolFailure::new(report.tool, &error));
        }
        Outcome::Cancelled => {
            ledger.failures.push(ToolFailure::cancelled(report.tool));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

enum Outcome {
    Completed(Vec<SearchResult>),
    Failed(ToolError),
    Cancelled,
}

struct Report {
    tool: String,
    weight: f64,
    elapsed: Duration,
    outcome: Outcome,
}

/// One dispatched adapter call
struct Worker {
    registration: Arc<ToolRegistration>,
    breaker: Arc<CircuitBreaker>,
    tracker: Arc<PerformanceTracker>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl Worker {
    /// Run the call. `admission` is held until the call ends so a half-open
    /// probe slot is released on every path, cancellation included.
    async fn run(self, query: String, admission: Admission, cancel: CancellationToken) -> Report {
        let _admission = admission;
        let started = Instant::now();
        let registration = &self.registration;

        let call = async {
            let _permit = match self.permits.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (
                        Err(ToolError::Configuration("concurrency limiter closed".to_string())),
                        Duration::ZERO,
                    )
                }
            };

            let call_started = Instant::now();
            let search = AssertUnwindSafe(registration.tool.search(&query, registration.max_results))
                .catch_unwind();
            let result = match timeout(self.timeout, search).await {
                Ok(Ok(result)) => result,
                Ok(Err(payload)) => Err(ToolError::Panicked(panic_message(payload.as_ref()))),
                Err(_) => Err(ToolError::Timeout(self.timeout)),
            };
            (result, call_started.elapsed())
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // Cut off by the deadline; not the tool's fault.
                debug!(tool = %registration.id, "cancelled");
                Outcome::Cancelled
            }
            (result, latency) = call => match result {
                Ok(results) => {
                    self.breaker.record_success();
                    self.tracker.record(&registration.id, latency, true);
                    Outcome::Completed(results)
                }
                Err(error) => {
                    self.breaker.record_failure();
                    self.tracker.record(&registration.id, latency, false);
                    Outcome::Failed(error)
                }
            },
        };

        Report {
            tool: registration.id.clone(),
            weight: registration.weight,
            elapsed: started.elapsed(),
            outcome,
        }
    }
}
