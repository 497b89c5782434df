//! HTTP forwarding sink
//!
//! Ships events to a collector endpoint as JSON, best-effort: at-most-once,
//! no retry, bounded timeout. The synchronous path hands the send to a
//! background task and reports `Queued`; transmission failures degrade to
//! `Failure` and are never surfaced to the instrumented call site.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use qulab_core::domain::{EventProperties, PiiKind, Value};
use qulab_core::ports::{ITelemetrySink, SinkStatus};

use crate::context::ContextEntry;

/// Upper bound on a single transmission attempt.
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Sink that POSTs each event to a collector endpoint
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
    context: DashMap<String, ContextEntry>,
}

impl HttpSink {
    /// Creates a sink targeting `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            context: DashMap::new(),
        })
    }

    /// Serializes an event together with the sink's recorded context.
    ///
    /// Built at hand-off time so the payload reflects the context as of
    /// emission, not as of transmission.
    fn payload(&self, event: &EventProperties) -> serde_json::Value {
        let context: BTreeMap<String, Value> = self
            .context
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().value.clone()))
            .collect();
        serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "name": event.name().as_str(),
            "properties": event.properties(),
            "piiProperties": event.pii_properties(),
            "context": context,
        })
    }
}

/// Performs the POST; failures map to `Failure`, never an error.
async fn post_event(
    client: reqwest::Client,
    endpoint: String,
    payload: serde_json::Value,
) -> SinkStatus {
    match client.post(&endpoint).json(&payload).send().await {
        Ok(response) if response.status().is_success() => SinkStatus::Ok,
        Ok(response) => {
            tracing::debug!(status = %response.status(), "Telemetry collector rejected event");
            SinkStatus::Failure
        }
        Err(e) => {
            tracing::debug!(error = %e, "Telemetry transmission failed");
            SinkStatus::Failure
        }
    }
}

#[async_trait::async_trait]
impl ITelemetrySink for HttpSink {
    fn log_event(&self, event: &EventProperties) -> anyhow::Result<SinkStatus> {
        let payload = self.payload(event);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(post_event(
                    self.client.clone(),
                    self.endpoint.clone(),
                    payload,
                ));
                Ok(SinkStatus::Queued)
            }
            Err(_) => {
                // No runtime to queue onto; the event is abandoned rather
                // than blocking the caller on network I/O.
                tracing::debug!("Telemetry event dropped outside async runtime");
                Ok(SinkStatus::Failure)
            }
        }
    }

    async fn log_event_async(&self, event: &EventProperties) -> anyhow::Result<SinkStatus> {
        let payload = self.payload(event);
        Ok(post_event(self.client.clone(), self.endpoint.clone(), payload).await)
    }

    fn set_context(&self, key: &str, value: Value, pii: PiiKind) -> anyhow::Result<SinkStatus> {
        self.context.insert(key.to_string(), ContextEntry { value, pii });
        Ok(SinkStatus::Ok)
    }
}
