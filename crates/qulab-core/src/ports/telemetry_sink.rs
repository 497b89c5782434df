//! Telemetry sink port (driven/secondary port)
//!
//! This module defines the interface for shipping telemetry events to a
//! consumer. Implementations may forward events to an analytics backend
//! over HTTP or retain them in memory for test assertions.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because transmission failures are
//!   adapter-specific.
//! - The sink is selected at composition time and injected into the
//!   telemetry service's constructor; business logic never branches on
//!   which implementation is active.
//! - `log_event` must return without blocking on network I/O; adapters
//!   that transmit remotely report [`SinkStatus::Queued`] and complete in
//!   the background. `log_event_async` may be awaited for a best-effort
//!   delivery confirmation, never to gate result availability.
//! - Delivery is at-most-once: a failed or slow send is abandoned, not
//!   retried.

use serde::{Deserialize, Serialize};

use crate::domain::{EventProperties, PiiKind, Value};

/// Outcome of handing an event (or context entry) to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkStatus {
    /// The sink accepted and fully processed the event
    Ok,
    /// The sink accepted the event for background transmission
    Queued,
    /// The sink could not process the event; the event is dropped
    Failure,
}

impl std::fmt::Display for SinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SinkStatus::Ok => "ok",
            SinkStatus::Queued => "queued",
            SinkStatus::Failure => "failure",
        };
        write!(f, "{s}")
    }
}

/// Port trait for telemetry event consumers
///
/// ## Implementation Notes
///
/// - `log_event` is the synchronous path for call sites that cannot
///   await; it must not block on transmission.
/// - `log_event_async` awaits the hand-off and resolves to a terminal
///   status.
/// - `set_context` records a process-wide context property; sinks attach
///   recorded context to events they transmit. The PII classification is
///   passed through unchanged as handling metadata.
/// - Implementations must be safe under concurrent calls from the
///   foreground operation path and background sampling tasks.
#[async_trait::async_trait]
pub trait ITelemetrySink: Send + Sync {
    /// Accepts an event synchronously.
    fn log_event(&self, event: &EventProperties) -> anyhow::Result<SinkStatus>;

    /// Accepts an event, resolving once the hand-off completes.
    async fn log_event_async(&self, event: &EventProperties) -> anyhow::Result<SinkStatus>;

    /// Records a context property to attach to subsequent events.
    fn set_context(&self, key: &str, value: Value, pii: PiiKind) -> anyhow::Result<SinkStatus>;
}
