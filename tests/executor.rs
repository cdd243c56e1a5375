//! Integration tests for the tiered executor.
//!
//! Every adapter here is a call-counting fake; the tokio clock is paused so
//! latencies and deadlines are exact.

use async_trait::async_trait;
use futures::future::join_all;
use parallel_search::breaker::{BreakerBoard, BreakerConfig, CircuitState};
use parallel_search::metrics::PerformanceTracker;
use parallel_search::results::{ResultKind, SearchResult};
use parallel_search::search::{ParallelSearchExecutor, SearchOptions};
use parallel_search::tools::{SearchPriority, SearchTool, ToolRegistration, ToolRegistry};
use parallel_search::{SearchError, ToolError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct FakeTool {
    name: &'static str,
    kind: ResultKind,
    delay: Duration,
    results: usize,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeTool {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            kind: ResultKind::Text,
            delay: Duration::from_millis(10),
            results: 3,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    fn delay(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    fn results(mut self, n: usize) -> Self {
        self.results = n;
        self
    }

    fn kind(mut self, kind: ResultKind) -> Self {
        self.kind = kind;
        self
    }

    fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn build(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl SearchTool for FakeTool {
    fn name(&self) -> &str {
        self.name
    }

    fn kinds(&self) -> Vec<ResultKind> {
        vec![self.kind]
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        if self.failing.load(Ordering::SeqCst) {
            return Err(ToolError::Http(500));
        }

        Ok((0..self.results.min(max_results))
            .map(|i| {
                SearchResult::new(
                    format!("https://{}.example.com/{}/{}", self.name, query, i),
                    format!("{} result {}", self.name, i),
                    self.name,
                )
                .with_kind(self.kind)
            })
            .collect())
    }
}

fn register(tool: &Arc<FakeTool>, priority: SearchPriority) -> ToolRegistration {
    ToolRegistration::new(tool.clone(), priority)
}

fn executor(registrations: Vec<ToolRegistration>) -> ParallelSearchExecutor {
    executor_with_breakers(registrations, BreakerConfig::default())
}

fn executor_with_breakers(
    registrations: Vec<ToolRegistration>,
    breaker: BreakerConfig,
) -> ParallelSearchExecutor {
    let registry = ToolRegistry::new();
    for registration in registrations {
        registry.register(registration).unwrap();
    }
    ParallelSearchExecutor::new(
        Arc::new(registry),
        Arc::new(BreakerBoard::new(breaker)),
        Arc::new(PerformanceTracker::default()),
    )
}

#[tokio::test(start_paused = true)]
async fn test_critical_and_high_suffice_fallback_skipped() {
    let t1 = FakeTool::new("t1").delay(100).results(5).build();
    let t2 = FakeTool::new("t2").delay(50).results(3).build();
    let t3 = FakeTool::new("t3").delay(10).results(10).build();

    let executor = executor(vec![
        register(&t1, SearchPriority::Critical).with_weight(2.0),
        register(&t2, SearchPriority::High).with_weight(1.0),
        register(&t3, SearchPriority::Fallback),
    ]);

    let options = SearchOptions::new().with_min_results(5);
    let merged = executor.execute("rust", &options).await.unwrap();

    assert_eq!((t1.calls(), t2.calls(), t3.calls()), (1, 1, 0));
    assert_eq!(merged.tools_attempted, vec!["t1", "t2"]);
    assert_eq!(merged.len(), 8);
    assert!(merged.results[..5].iter().all(|r| r.source_tool == "t1"));
    assert!(merged.results[5..].iter().all(|r| r.source_tool == "t2"));
    assert!(
        (100..150).contains(&merged.execution_time_ms),
        "took {}ms",
        merged.execution_time_ms
    );
}

#[tokio::test(start_paused = true)]
async fn test_sufficient_critical_tier_skips_lower_tiers() {
    let critical = FakeTool::new("critical").results(6).build();
    let medium = FakeTool::new("medium").build();
    let low = FakeTool::new("low").build();
    let fallback = FakeTool::new("fallback").build();

    let executor = executor(vec![
        register(&critical, SearchPriority::Critical),
        register(&medium, SearchPriority::Medium),
        register(&low, SearchPriority::Low),
        register(&fallback, SearchPriority::Fallback),
    ]);

    let merged = executor
        .execute("rust", &SearchOptions::new().with_min_results(5))
        .await
        .unwrap();

    assert_eq!(critical.calls(), 1);
    assert_eq!((medium.calls(), low.calls(), fallback.calls()), (0, 0, 0));
    assert_eq!(merged.len(), 6);

    // Turning the policy off always queries MEDIUM and LOW, never FALLBACK.
    executor
        .execute("rust", &SearchOptions::new().with_min_results(5).exhaustive())
        .await
        .unwrap();
    assert_eq!((medium.calls(), low.calls(), fallback.calls()), (1, 1, 0));
}

#[tokio::test(start_paused = true)]
async fn test_insufficient_results_dispatch_medium_and_low_together() {
    let critical = FakeTool::new("critical").results(1).build();
    let medium = FakeTool::new("medium").delay(200).results(2).build();
    let low = FakeTool::new("low").delay(200).results(2).build();

    let executor = executor(vec![
        register(&critical, SearchPriority::Critical),
        register(&medium, SearchPriority::Medium),
        register(&low, SearchPriority::Low),
    ]);

    let merged = executor
        .execute("rust", &SearchOptions::new().with_min_results(5))
        .await
        .unwrap();

    assert_eq!(merged.len(), 5);
    assert_eq!(merged.tools_succeeded.len(), 3);
    // 10ms for the first wave, then MEDIUM and LOW in parallel.
    assert!(merged.execution_time_ms < 400, "took {}ms", merged.execution_time_ms);
}

#[tokio::test(start_paused = true)]
async fn test_fallback_runs_only_without_results() {
    let empty = FakeTool::new("empty").results(0).build();
    let fallback = FakeTool::new("fallback").results(2).build();

    let executor = executor(vec![
        register(&empty, SearchPriority::Critical),
        register(&fallback, SearchPriority::Fallback),
    ]);

    let merged = executor.execute("rust", &SearchOptions::new()).await.unwrap();
    assert_eq!(fallback.calls(), 1);
    assert_eq!(merged.len(), 2);
    // An empty answer is a success, not a failure.
    assert!(merged.tools_succeeded.contains(&"empty".to_string()));
    assert!(merged.failures.is_empty());

    let one = FakeTool::new("one").results(1).build();
    let fallback = FakeTool::new("fallback").results(2).build();
    let executor = self::executor(vec![
        register(&one, SearchPriority::High),
        register(&fallback, SearchPriority::Fallback),
    ]);

    let merged = executor.execute("rust", &SearchOptions::new()).await.unwrap();
    assert_eq!(fallback.calls(), 0);
    assert_eq!(merged.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_all_tools_failing_yields_empty_set() {
    let a = FakeTool::new("a").failing().build();
    let b = FakeTool::new("b").failing().build();
    let c = FakeTool::new("c").failing().build();

    let executor = executor(vec![
        register(&a, SearchPriority::Critical),
        register(&b, SearchPriority::Medium),
        register(&c, SearchPriority::Fallback),
    ]);

    let merged = executor.execute("rust", &SearchOptions::new()).await.unwrap();

    assert!(merged.is_empty());
    assert!(merged.tools_succeeded.is_empty());
    assert_eq!(merged.tools_attempted, vec!["a", "b", "c"]);
    assert_eq!(merged.failures.len(), 3);
    assert!(merged.failures.iter().all(|f| f.kind == "http_error"));
}

#[tokio::test(start_paused = true)]
async fn test_open_breaker_never_invokes_adapter() {
    let flaky = FakeTool::new("flaky").failing().build();
    let healthy = FakeTool::new("healthy").results(5).build();

    let executor = executor(vec![
        register(&flaky, SearchPriority::Critical),
        register(&healthy, SearchPriority::High),
    ]);
    let options = SearchOptions::new();

    for _ in 0..3 {
        executor.execute("rust", &options).await.unwrap();
    }
    assert_eq!(flaky.calls(), 3);
    assert_eq!(executor.breakers().state("flaky"), CircuitState::Open);

    let merged = executor.execute("rust", &options).await.unwrap();
    assert_eq!(flaky.calls(), 3);
    assert_eq!(healthy.calls(), 4);
    assert_eq!(merged.tools_circuit_open, vec!["flaky"]);
    assert!(!merged.tools_attempted.contains(&"flaky".to_string()));
    assert_eq!(merged.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_admits_exactly_one_probe() {
    let flaky = FakeTool::new("flaky").delay(100).failing().build();
    let executor = executor_with_breakers(
        vec![register(&flaky, SearchPriority::High)],
        BreakerConfig {
            cooldown: Duration::from_secs(30),
            ..BreakerConfig::default()
        },
    );
    let options = SearchOptions::new();

    for _ in 0..3 {
        executor.execute("rust", &options).await.unwrap();
    }
    assert_eq!(executor.breakers().state("flaky"), CircuitState::Open);

    // Every breaker is open: no waiting, no call.
    let merged = executor.execute("rust", &options).await.unwrap();
    assert_eq!(merged.execution_time_ms, 0);
    assert_eq!(merged.tools_circuit_open, vec!["flaky"]);
    assert_eq!(flaky.calls(), 3);

    tokio::time::advance(Duration::from_secs(31)).await;
    flaky.set_failing(false);

    let sets: Vec<_> = join_all((0..3).map(|_| executor.execute("rust", &options)))
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(flaky.calls(), 4);
    assert_eq!(sets.iter().filter(|s| !s.tools_attempted.is_empty()).count(), 1);
    assert_eq!(sets.iter().filter(|s| !s.tools_circuit_open.is_empty()).count(), 2);
    assert_eq!(executor.breakers().state("flaky"), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_failed_probe_reopens_circuit() {
    let flaky = FakeTool::new("flaky").failing().build();
    let executor = executor(vec![register(&flaky, SearchPriority::High)]);
    let options = SearchOptions::new();

    for _ in 0..3 {
        executor.execute("rust", &options).await.unwrap();
    }
    tokio::time::advance(Duration::from_secs(31)).await;

    executor.execute("rust", &options).await.unwrap();
    assert_eq!(flaky.calls(), 4);
    assert_eq!(executor.breakers().state("flaky"), CircuitState::Open);

    executor.execute("rust", &options).await.unwrap();
    assert_eq!(flaky.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_higher_weight_wins_duplicate_urls() {
    struct Fixed(&'static str, &'static str);

    #[async_trait]
    impl SearchTool for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchResult>, ToolError> {
            Ok(vec![
                SearchResult::new(self.1, "Rust", self.0),
                SearchResult::new(format!("https://{}.example.org/only", self.0), "Only", self.0),
            ])
        }
    }

    let executor = executor(vec![
        ToolRegistration::new(
            Arc::new(Fixed("light", "https://www.rust-lang.org/learn/")),
            SearchPriority::Critical,
        )
        .with_weight(0.5),
        ToolRegistration::new(
            Arc::new(Fixed("heavy", "https://WWW.rust-lang.org/learn?utm_source=feed#intro")),
            SearchPriority::High,
        )
        .with_weight(2.0),
    ]);

    let merged = executor.execute("rust", &SearchOptions::new()).await.unwrap();

    assert_eq!(merged.len(), 3);
    let rust: Vec<_> = merged
        .results
        .iter()
        .filter(|r| r.url.to_lowercase().contains("rust-lang.org"))
        .collect();
    assert_eq!(rust.len(), 1);
    assert_eq!(rust[0].source_tool, "heavy");
    assert_eq!(merged.results[0].source_tool, "heavy");
}

#[tokio::test(start_paused = true)]
async fn test_deadline_cancels_outstanding_workers() {
    let first = FakeTool::new("first").delay(60_000).build();
    let second = FakeTool::new("second").delay(60_000).build();

    let registry = ToolRegistry::new();
    registry.register(register(&first, SearchPriority::High)).unwrap();
    registry.register(register(&second, SearchPriority::High)).unwrap();
    let tracker = Arc::new(PerformanceTracker::default());
    let breakers = Arc::new(BreakerBoard::default());
    let executor = ParallelSearchExecutor::new(Arc::new(registry), breakers.clone(), tracker.clone())
        .with_max_concurrency(1)
        .with_cancellation_grace(Duration::from_millis(200));

    let budget = Duration::from_millis(300);
    let merged = executor
        .execute("rust", &SearchOptions::new().with_budget(budget))
        .await
        .unwrap();

    assert!(merged.is_empty());
    assert!(merged.execution_time_ms <= 300 + 1000 + 200);

    // The second tool never got the permit before the deadline fired: it was
    // cancelled, which is not held against it.
    let cancelled = merged
        .failures
        .iter()
        .find(|f| f.tool == "second")
        .unwrap();
    assert_eq!(cancelled.kind, "cancelled");
    assert_eq!(tracker.stats("second").samples, 0);
    assert_eq!(breakers.breaker("second").snapshot().consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_critical_tool_waited_past_deadline_then_lower_tiers_skipped() {
    let slow = FakeTool::new("slow").delay(800).results(1).build();
    let medium = FakeTool::new("medium").build();

    let executor = executor(vec![
        register(&slow, SearchPriority::Critical).with_timeout(Duration::from_secs(2)),
        register(&medium, SearchPriority::Medium),
    ]);

    let merged = executor
        .execute(
            "rust",
            &SearchOptions::new()
                .with_budget(Duration::from_millis(500))
                .with_min_results(5),
        )
        .await
        .unwrap();

    assert_eq!(merged.len(), 1);
    assert_eq!(merged.tools_succeeded, vec!["slow"]);
    assert_eq!(medium.calls(), 0);
    assert_eq!(merged.tools_skipped, vec!["medium"]);
    assert!(!merged.tools_attempted.contains(&"medium".to_string()));
    assert!((800..900).contains(&merged.execution_time_ms));
}

#[tokio::test(start_paused = true)]
async fn test_zero_budget_attempts_nothing() {
    let tool = FakeTool::new("tool").build();
    let executor = executor(vec![register(&tool, SearchPriority::Critical)]);

    let merged = executor
        .execute("rust", &SearchOptions::new().with_budget(Duration::ZERO))
        .await
        .unwrap();

    assert_eq!(tool.calls(), 0);
    assert!(merged.tools_attempted.is_empty());
    assert_eq!(merged.tools_skipped, vec!["tool"]);
}

#[tokio::test(start_paused = true)]
async fn test_requested_kinds_select_tools_and_results() {
    let web = FakeTool::new("web").build();
    let images = FakeTool::new("images").kind(ResultKind::Image).build();

    let executor = executor(vec![
        register(&web, SearchPriority::High),
        register(&images, SearchPriority::High),
    ]);

    let merged = executor
        .execute("cats", &SearchOptions::new().with_kinds([ResultKind::Image]))
        .await
        .unwrap();

    assert_eq!(web.calls(), 0);
    assert_eq!(images.calls(), 1);
    assert!(merged.results.iter().all(|r| r.kind == ResultKind::Image));

    let err = executor
        .execute("cats", &SearchOptions::new().with_kinds([ResultKind::Video]))
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::NoToolsForKinds { .. }));
}

/// Serves text and images but only ever answers with text
struct TextOnly {
    calls: AtomicUsize,
}

#[async_trait]
impl SearchTool for TextOnly {
    fn name(&self) -> &str {
        "text_only"
    }

    fn kinds(&self) -> Vec<ResultKind> {
        vec![ResultKind::Text, ResultKind::Image]
    }

    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchResult>, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..5.min(max_results))
            .map(|i| SearchResult::new(format!("https://text.example.com/{}", i), "Text", "text_only"))
            .collect())
    }
}

#[tokio::test(start_paused = true)]
async fn test_unrequested_kinds_do_not_count_as_sufficient() {
    let images = FakeTool::new("images").kind(ResultKind::Image).results(1).build();
    let executor = executor(vec![
        ToolRegistration::new(
            Arc::new(TextOnly { calls: AtomicUsize::new(0) }),
            SearchPriority::Critical,
        ),
        register(&images, SearchPriority::Medium),
    ]);

    let options = SearchOptions::new()
        .with_kinds([ResultKind::Image])
        .with_min_results(5);
    let merged = executor.execute("cats", &options).await.unwrap();

    assert_eq!(images.calls(), 1);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged.results[0].source_tool, "images");

    // Nothing usable from the first wave: the fallback image tool runs too.
    let fallback = FakeTool::new("fallback").kind(ResultKind::Image).results(2).build();
    let executor = self::executor(vec![
        ToolRegistration::new(
            Arc::new(TextOnly { calls: AtomicUsize::new(0) }),
            SearchPriority::Critical,
        ),
        register(&fallback, SearchPriority::Fallback),
    ]);
    let merged = executor.execute("cats", &options).await.unwrap();

    assert_eq!(fallback.calls(), 1);
    assert_eq!(merged.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_urls_do_not_count_as_sufficient() {
    struct Echo;

    #[async_trait]
    impl SearchTool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchResult>, ToolError> {
            Ok((0..5)
                .map(|_| SearchResult::new("https://echo.example.com/same", "Same", "echo"))
                .collect())
        }
    }

    let medium = FakeTool::new("medium").results(2).build();
    let executor = executor(vec![
        ToolRegistration::new(Arc::new(Echo), SearchPriority::Critical),
        register(&medium, SearchPriority::Medium),
    ]);

    let merged = executor
        .execute("rust", &SearchOptions::new().with_min_results(5))
        .await
        .unwrap();

    assert_eq!(medium.calls(), 1);
    assert_eq!(merged.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_adapter_counts_as_failure() {
    struct Exploding {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchTool for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }

        async fn search(&self, _query: &str, _max: usize) -> Result<Vec<SearchResult>, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("provider exploded")
        }
    }

    let exploding = Arc::new(Exploding {
        calls: AtomicUsize::new(0),
    });
    let healthy = FakeTool::new("healthy").results(5).build();
    let executor = executor(vec![
        ToolRegistration::new(exploding.clone(), SearchPriority::Critical),
        register(&healthy, SearchPriority::High),
    ]);
    let options = SearchOptions::new();

    for _ in 0..3 {
        let merged = executor.execute("rust", &options).await.unwrap();
        assert_eq!(merged.len(), 5);
        let failure = merged.failures.iter().find(|f| f.tool == "exploding").unwrap();
        assert_eq!(failure.kind, "panic");
        assert!(failure.message.contains("provider exploded"));
    }

    assert_eq!(executor.breakers().state("exploding"), CircuitState::Open);
    assert_eq!(executor.tracker().stats("exploding").samples, 3);

    let merged = executor.execute("rust", &options).await.unwrap();
    assert_eq!(exploding.calls.load(Ordering::SeqCst), 3);
    assert_eq!(merged.tools_circuit_open, vec!["exploding"]);
}

#[tokio::test(start_paused = true)]
async fn test_tool_stats_reflect_calls() {
    let good = FakeTool::new("good").delay(100).build();
    let bad = FakeTool::new("bad").failing().build();

    let executor = executor(vec![
        register(&bad, SearchPriority::Low),
        register(&good, SearchPriority::Critical),
    ]);
    executor
        .execute("rust", &SearchOptions::new().exhaustive())
        .await
        .unwrap();

    let stats = executor.tool_stats();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].tool, "good");
    assert_eq!(stats[0].samples, 1);
    assert!((stats[0].ewma_latency_ms - 100.0).abs() < 1e-6);
    assert_eq!(stats[1].tool, "bad");
    assert!(stats[1].success_rate < 1.0);
    assert_eq!(stats[1].consecutive_failures, 1);
}

#[test]
fn test_caller_errors() {
    let executor = executor(vec![]);
    let err = tokio_test::block_on(executor.execute("rust", &SearchOptions::new())).unwrap_err();
    assert!(matches!(err, SearchError::NoToolsRegistered));

    let tool = FakeTool::new("tool").build();
    let executor = self::executor(vec![register(&tool, SearchPriority::High)]);

    let err = tokio_test::block_on(executor.execute("   ", &SearchOptions::new())).unwrap_err();
    assert!(matches!(err, SearchError::EmptyQuery));

    let err = tokio_test::block_on(
        executor.execute("rust", &SearchOptions::new().with_max_results(0)),
    )
    .unwrap_err();
    assert!(matches!(err, SearchError::InvalidOptions(_)));
    assert_eq!(tool.calls(), 0);
}
