//! Search options and execution state

use crate::config::ExecutorSettings;
use crate::error::SearchError;
use crate::results::ResultKind;
use std::fmt;
use std::time::Duration;

/// Per-call search options
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Overall latency budget; the deadline is `now + budget`
    pub budget: Duration,
    /// Sufficiency threshold checked after each wave
    pub min_results: usize,
    /// Cap on the merged result count
    pub max_results: usize,
    /// Requested result kinds (empty means any)
    pub kinds: Vec<ResultKind>,
    /// Halve a result's score every `half_life` of age, when set
    pub recency_half_life: Option<Duration>,
    /// Skip MEDIUM and LOW tools once `min_results` usable results are in
    pub skip_lower_tiers_when_sufficient: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from(&ExecutorSettings::default())
    }
}

impl From<&ExecutorSettings> for SearchOptions {
    fn from(settings: &ExecutorSettings) -> Self {
        Self {
            budget: settings.budget(),
            min_results: settings.min_results,
            max_results: settings.max_results,
            kinds: Vec::new(),
            recency_half_life: None,
            skip_lower_tiers_when_sufficient: settings.skip_lower_tiers_when_sufficient,
        }
    }
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_min_results(mut self, min_results: usize) -> Self {
        self.min_results = min_results;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = ResultKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self.kinds.sort();
        self.kinds.dedup();
        self
    }

    pub fn with_recency_bias(mut self, half_life: Duration) -> Self {
        self.recency_half_life = Some(half_life);
        self
    }

    /// Always dispatch MEDIUM and LOW tools, however many results are in
    pub fn exhaustive(mut self) -> Self {
        self.skip_lower_tiers_when_sufficient = false;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SearchError> {
        if self.max_results == 0 {
            return Err(SearchError::InvalidOptions(
                "max_results must be at least 1".to_string(),
            ));
        }
        if self.recency_half_life.is_some_and(|h| h.is_zero()) {
            return Err(SearchError::InvalidOptions(
                "recency half-life must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-call executor state. Every call ends in [`ExecutionPhase::Done`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    DispatchingCritical,
    DispatchingHigh,
    DispatchingMediumLow,
    Awaiting,
    Merging,
    Done,
}

impl ExecutionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DispatchingCritical => "dispatching_critical",
            Self::DispatchingHigh => "dispatching_high",
            Self::DispatchingMediumLow => "dispatching_medium_low",
            Self::Awaiting => "awaiting",
            Self::Merging => "merging",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
