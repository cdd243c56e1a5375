//! Result merger for deduplicating and ranking results from multiple tools

use super::normalize::normalize_url;
use super::types::*;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

/// Results returned by one tool, tagged with that tool's weight
#[derive(Debug, Clone)]
pub struct ToolBatch {
    pub tool: String,
    pub weight: f64,
    pub results: Vec<SearchResult>,
}

/// A result that survived deduplication, with its arrival position
#[derive(Debug)]
struct Candidate {
    arrival: usize,
    weight: f64,
    result: SearchResult,
}

/// Collects per-tool result lists and fuses them into one ranked set.
///
/// Batches are appended in arrival order and never reordered; ranking is
/// computed once, in [`ResultMerger::finish`].
#[derive(Debug)]
pub struct ResultMerger {
    batches: Vec<ToolBatch>,
    max_results: usize,
    recency_half_life: Option<Duration>,
    kinds: HashSet<ResultKind>,
}

impl ResultMerger {
    /// Create a merger that truncates to `max_results`
    pub fn new(max_results: usize) -> Self {
        Self {
            batches: Vec::new(),
            max_results,
            recency_half_life: None,
            kinds: HashSet::new(),
        }
    }

    /// Decay scores by result age, halving every `half_life`
    pub fn with_recency_bias(mut self, half_life: Duration) -> Self {
        self.recency_half_life = Some(half_life);
        self
    }

    /// Keep only results of these kinds (empty keeps everything)
    pub fn with_kinds(mut self, kinds: HashSet<ResultKind>) -> Self {
        self.kinds = kinds;
        self
    }

    /// Add one tool's results
    pub fn add_batch(&mut self, tool: impl Into<String>, weight: f64, results: Vec<SearchResult>) {
        self.batches.push(ToolBatch {
            tool: tool.into(),
            weight,
            results,
        });
    }

    /// Number of raw (pre-dedup) results collected so far
    pub fn result_count(&self) -> usize {
        self.batches.iter().map(|b| b.results.len()).sum()
    }

    /// Distinct URLs of the requested kinds collected so far; an upper bound
    /// on what [`ResultMerger::merge`] returns before truncation
    pub fn usable_count(&self) -> usize {
        self.batches
            .iter()
            .flat_map(|b| &b.results)
            .filter(|r| self.wants(r.kind))
            .map(|r| normalize_url(&r.url))
            .filter(|key| !key.is_empty())
            .collect::<HashSet<_>>()
            .len()
    }

    fn wants(&self, kind: ResultKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }

    /// Deduplicate, score, sort and truncate the collected results
    pub fn merge(&self, now: DateTime<Utc>) -> Vec<SearchResult> {
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut by_url: HashMap<String, usize> = HashMap::new();
        let mut arrival = 0usize;

        for batch in &self.batches {
            for result in &batch.results {
                arrival += 1;

                if !self.wants(result.kind) {
                    continue;
                }

                let key = normalize_url(&result.url);
                if key.is_empty() {
                    debug!(tool = %batch.tool, "dropping result without URL");
                    continue;
                }

                let mut result = result.clone();
                result.source_tool = batch.tool.clone();

                match by_url.get(&key) {
                    Some(&slot) => {
                        // Strictly higher weight wins; ties keep the first arrival.
                        if batch.weight > candidates[slot].weight {
                            candidates[slot] = Candidate {
                                arrival,
                                weight: batch.weight,
                                result,
                            };
                        }
                    }
                    None => {
                        by_url.insert(key, candidates.len());
                        candidates.push(Candidate {
                            arrival,
                            weight: batch.weight,
                            result,
                        });
                    }
                }
            }
        }

        for candidate in &mut candidates {
            candidate.result.score = candidate.weight * self.recency_factor(&candidate.result, now);
        }

        candidates.sort_by(|a, b| {
            b.result
                .score
                .partial_cmp(&a.result.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.arrival.cmp(&b.arrival))
        });

        candidates
            .into_iter()
            .take(self.max_results)
            .map(|c| c.result)
            .collect()
    }

    /// Build the final result set for a call
    pub fn finish(self, ledger: ExecutionLedger, elapsed: Duration) -> MergedResultSet {
        let results = self.merge(Utc::now());

        MergedResultSet {
            results,
            execution_time_ms: elapsed.as_millis() as u64,
            tools_attempted: ledger.tools_attempted,
            tools_succeeded: ledger.tools_succeeded,
            tools_circuit_open: ledger.tools_circuit_open,
            tools_skipped: ledger.tools_skipped,
            timings: ledger.timings,
            failures: ledger.failures,
        }
    }

    fn recency_factor(&self, result: &SearchResult, now: DateTime<Utc>) -> f64 {
        let (Some(half_life), Some(published)) = (self.recency_half_life, result.published_at) else {
            return 1.0;
        };

        let half_life = half_life.as_secs_f64();
        if half_life <= 0.0 {
            return 1.0;
        }

        let age = (now - published).num_milliseconds().max(0) as f64 / 1000.0;
        0.5f64.powf(age / half_life)
    }
}
