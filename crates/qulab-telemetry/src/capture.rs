//! In-memory capture sink (test double)
//!
//! Retains every logged event in emission order so tests can assert on
//! the exact sequence a kernel session produced. Swappable for the HTTP
//! sink at service construction with no other code-path changes.

use std::sync::Mutex;

use dashmap::DashMap;
use qulab_core::domain::{EventProperties, PiiKind, Value};
use qulab_core::ports::{ITelemetrySink, SinkStatus};

use crate::context::ContextEntry;

/// Sink that appends events to an ordered in-memory log
///
/// Both the synchronous and asynchronous log paths append; insertion
/// order is the order the sink observed emissions (completion order for
/// duration-wrapped events, not wall-clock start order). Appends are safe
/// under concurrency between the foreground operation path and the
/// background sampler.
#[derive(Debug, Default)]
pub struct CaptureSink {
    events: Mutex<Vec<EventProperties>>,
    context: DashMap<String, ContextEntry>,
}

impl CaptureSink {
    /// Creates an empty capture sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&self, event: &EventProperties) {
        // a poisoned lock still holds a valid log
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event.clone());
    }

    fn log(&self) -> Vec<EventProperties> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// All captured events, in emission order.
    pub fn events(&self) -> Vec<EventProperties> {
        self.log()
    }

    /// Captured events with the given name, in emission order.
    pub fn events_named(&self, name: &str) -> Vec<EventProperties> {
        self.log()
            .into_iter()
            .filter(|event| event.name() == name)
            .collect()
    }

    /// Captured events except those with the given name.
    ///
    /// Used to drop nondeterministic background events (periodic
    /// performance samples) before asserting on the remaining sequence.
    pub fn events_excluding(&self, name: &str) -> Vec<EventProperties> {
        self.log()
            .into_iter()
            .filter(|event| event.name() != name)
            .collect()
    }

    /// Number of captured events.
    pub fn event_count(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Empties the captured log. Recorded context is kept.
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Looks up a recorded context value.
    pub fn context_value(&self, key: &str) -> Option<Value> {
        self.context.get(key).map(|entry| entry.value.clone())
    }

    /// Looks up the PII classification recorded for a context key.
    pub fn context_pii(&self, key: &str) -> Option<PiiKind> {
        self.context.get(key).map(|entry| entry.pii)
    }
}

#[async_trait::async_trait]
impl ITelemetrySink for CaptureSink {
    fn log_event(&self, event: &EventProperties) -> anyhow::Result<SinkStatus> {
        self.append(event);
        Ok(SinkStatus::Ok)
    }

    async fn log_event_async(&self, event: &EventProperties) -> anyhow::Result<SinkStatus> {
        self.append(event);
        Ok(SinkStatus::Ok)
    }

    fn set_context(&self, key: &str, value: Value, pii: PiiKind) -> anyhow::Result<SinkStatus> {
        self.context.insert(key.to_string(), ContextEntry { value, pii });
        Ok(SinkStatus::Ok)
    }
}
