//! Tool registry
//!
//! Registration swaps in a new immutable [`RegistrySnapshot`]; searches hold
//! on to the snapshot they started with, so a late registration can never
//! change a call's view of its tools.

use super::traits::{SearchPriority, ToolRegistration};
use crate::error::RegistryError;
use crate::results::ResultKind;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

/// Immutable view of the registered tools
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    /// Registration order
    tools: Vec<Arc<ToolRegistration>>,
    by_id: HashMap<String, usize>,
}

impl RegistrySnapshot {
    /// Get a tool by identity
    pub fn get(&self, id: &str) -> Option<&Arc<ToolRegistration>> {
        self.by_id.get(id).map(|&i| &self.tools[i])
    }

    /// All tools in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ToolRegistration>> {
        self.tools.iter()
    }

    /// Tools of one priority, in registration order
    pub fn tier(&self, priority: SearchPriority) -> Vec<Arc<ToolRegistration>> {
        self.tools
            .iter()
            .filter(|t| t.priority == priority)
            .cloned()
            .collect()
    }

    /// Tools grouped by priority, highest first; empty groups are omitted
    pub fn list_by_priority(&self) -> Vec<(SearchPriority, Vec<Arc<ToolRegistration>>)> {
        SearchPriority::DESCENDING
            .iter()
            .map(|&p| (p, self.tier(p)))
            .filter(|(_, tools)| !tools.is_empty())
            .collect()
    }

    /// Every kind produced by at least one tool
    pub fn kinds(&self) -> BTreeSet<ResultKind> {
        self.tools.iter().flat_map(|t| t.tool.kinds()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Registry of all available search tools
#[derive(Debug, Default)]
pub struct ToolRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if the identity is taken or the
    /// configuration is invalid.
    pub fn register(&self, registration: ToolRegistration) -> Result<(), RegistryError> {
        registration.validate()?;

        // Writers serialize on the lock; readers keep their old snapshot.
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if current.by_id.contains_key(&registration.id) {
            return Err(RegistryError::DuplicateTool(registration.id));
        }

        let mut next = RegistrySnapshot::clone(&current);
        next.by_id.insert(registration.id.clone(), next.tools.len());
        next.tools.push(Arc::new(registration));
        *current = Arc::new(next);

        Ok(())
    }

    /// The current snapshot
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Tools grouped by priority, highest first
    pub fn list_by_priority(&self) -> Vec<(SearchPriority, Vec<Arc<ToolRegistration>>)> {
        self.snapshot().list_by_priority()
    }

    /// Check if a tool exists
    pub fn contains(&self, id: &str) -> bool {
        self.snapshot().get(id).is_some()
    }

    /// Get number of registered tools
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
