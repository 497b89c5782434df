//! Process-wide telemetry context
//!
//! Slowly-changing facts (versions, device id, hosting environment) that
//! are merged into every emitted event. Keys are upserted with
//! last-writer-wins semantics and never removed; snapshots are copies, so
//! later mutations do not retroactively affect already-emitted events.

use std::collections::BTreeMap;

use dashmap::DashMap;
use qulab_core::domain::{PiiKind, Value};

/// A context value together with its PII classification
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    pub value: Value,
    pub pii: PiiKind,
}

/// Concurrent store of process-wide context properties
///
/// Writes may arrive from any instrumented path as well as background
/// tasks; the map tolerates concurrent access with last-writer-wins
/// resolution, which is sufficient for the slowly-changing facts it
/// models.
#[derive(Debug, Default)]
pub struct ContextStore {
    entries: DashMap<String, ContextEntry>,
}

impl ContextStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts a context property, overwriting any prior value and PII
    /// tag for the key.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>, pii: PiiKind) {
        self.entries.insert(
            key.into(),
            ContextEntry {
                value: value.into(),
                pii,
            },
        );
    }

    /// Looks up a single entry.
    pub fn get(&self, key: &str) -> Option<ContextEntry> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    /// Returns a copy of the current mapping for merging into an event.
    pub fn snapshot(&self) -> BTreeMap<String, ContextEntry> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of context entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
