//! TelemetryService - event emission orchestration
//!
//! Owns the process-wide context store and the injected sink. All methods
//! are non-fatal: errors from the sink are logged via `tracing::warn!`
//! but never propagated, so telemetry can never affect the correctness or
//! error behavior of an instrumented kernel operation.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use qulab_core::config::TelemetryConfig;
use qulab_core::domain::{DeviceId, DomainError, EventProperties, PiiKind, Value};
use qulab_core::ports::{ITelemetrySink, SinkStatus};

use crate::context::ContextStore;
use crate::device;
use crate::timing::{self, OperationOutcome};

// ============================================================================
// Context keys
// ============================================================================

/// Application identifier, constant per product.
pub const CONTEXT_APP_ID: &str = "AppInfo.Id";
/// Kernel version string.
pub const CONTEXT_APP_VERSION: &str = "AppInfo.Version";
/// Version of the compiler library the kernel links against.
pub const CONTEXT_COMPILER_VERSION: &str = "Qulab.Kernel.CompilerVersion";
/// Version of the simulation library the kernel links against.
pub const CONTEXT_SIMULATOR_VERSION: &str = "Qulab.Kernel.SimulationVersion";
/// Name (not path) of the kernel's working directory.
pub const CONTEXT_ROOT: &str = "Qulab.Kernel.Root";
/// Stable per-installation device identifier.
pub const CONTEXT_DEVICE_ID: &str = "Qulab.Kernel.DeviceId";
/// User-agent label of the embedding host.
pub const CONTEXT_USER_AGENT: &str = "Qulab.Kernel.UserAgent";
/// Hosting-environment label.
pub const CONTEXT_HOSTING_ENVIRONMENT: &str = "Qulab.Kernel.HostingEnvironment";

/// Version strings of the kernel and the libraries it embeds
///
/// Supplied by the embedding kernel at service construction and attached
/// to every event's context.
#[derive(Debug, Clone)]
pub struct KernelVersions {
    pub kernel: String,
    pub compiler: String,
    pub simulator: String,
}

impl KernelVersions {
    /// Bundles the three version strings.
    pub fn new(
        kernel: impl Into<String>,
        compiler: impl Into<String>,
        simulator: impl Into<String>,
    ) -> Self {
        Self {
            kernel: kernel.into(),
            compiler: compiler.into(),
            simulator: simulator.into(),
        }
    }
}

// ============================================================================
// TelemetryService
// ============================================================================

/// Orchestrates event construction and hand-off to the active sink
///
/// Created once per kernel session with the sink injected at
/// construction, which seeds identity and version context. Whether
/// telemetry is enabled is decided here once; call sites never branch.
pub struct TelemetryService {
    sink: Arc<dyn ITelemetrySink>,
    context: ContextStore,
    enabled: bool,
}

impl TelemetryService {
    /// Creates a service and seeds context, resolving the device id from
    /// its persisted per-installation location.
    pub fn new(
        sink: Arc<dyn ITelemetrySink>,
        config: &TelemetryConfig,
        versions: &KernelVersions,
    ) -> Self {
        let device_id = match device::load_or_create(&device::default_path()) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to resolve device id");
                None
            }
        };
        Self::build(sink, config, versions, device_id)
    }

    /// Creates a service with an explicit device id, for hosts that
    /// manage installation identity themselves (and for tests).
    pub fn with_device_id(
        sink: Arc<dyn ITelemetrySink>,
        config: &TelemetryConfig,
        versions: &KernelVersions,
        device_id: DeviceId,
    ) -> Self {
        Self::build(sink, config, versions, Some(device_id))
    }

    fn build(
        sink: Arc<dyn ITelemetrySink>,
        config: &TelemetryConfig,
        versions: &KernelVersions,
        device_id: Option<DeviceId>,
    ) -> Self {
        let service = Self {
            sink,
            context: ContextStore::new(),
            enabled: config.enabled,
        };
        service.seed_context(config, versions, device_id);
        service
    }

    fn seed_context(
        &self,
        config: &TelemetryConfig,
        versions: &KernelVersions,
        device_id: Option<DeviceId>,
    ) {
        self.set_context(CONTEXT_APP_ID, "qulab", PiiKind::None);
        self.set_context(CONTEXT_APP_VERSION, versions.kernel.clone(), PiiKind::None);
        self.set_context(
            CONTEXT_COMPILER_VERSION,
            versions.compiler.clone(),
            PiiKind::None,
        );
        self.set_context(
            CONTEXT_SIMULATOR_VERSION,
            versions.simulator.clone(),
            PiiKind::None,
        );

        // Directory name only; the full path would be PII.
        let root = std::env::current_dir()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_default();
        self.set_context(CONTEXT_ROOT, root, PiiKind::GenericData);

        if let Some(id) = device_id {
            self.set_context(CONTEXT_DEVICE_ID, *id.as_uuid(), PiiKind::None);
        }
        if let Some(agent) = &config.user_agent {
            self.set_context(CONTEXT_USER_AGENT, agent.clone(), PiiKind::None);
        }
        if let Some(env) = &config.hosting_environment {
            self.set_context(CONTEXT_HOSTING_ENVIRONMENT, env.clone(), PiiKind::None);
        }
    }

    /// Whether events are being collected.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The process-wide context attached to every emitted event.
    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    /// Upserts a context property and forwards it to the sink.
    pub fn set_context(&self, key: &str, value: impl Into<Value>, pii: PiiKind) {
        let value = value.into();
        self.context.set(key, value.clone(), pii);
        if let Err(e) = self.sink.set_context(key, value, pii) {
            tracing::warn!(error = %e, key, "Telemetry sink rejected context property");
        }
    }

    /// Merges the current context snapshot into an event; event-supplied
    /// keys win on conflict.
    fn merge_context(&self, mut event: EventProperties) -> EventProperties {
        for (key, entry) in self.context.snapshot() {
            event.merge_context_property(&key, entry.value, entry.pii);
        }
        event
    }

    /// Emits an event through the synchronous sink path.
    ///
    /// Sink errors are swallowed and reported as [`SinkStatus::Failure`].
    pub fn emit(&self, event: EventProperties) -> SinkStatus {
        if !self.enabled {
            return SinkStatus::Ok;
        }
        let event = self.merge_context(event);
        match self.sink.log_event(&event) {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, event = %event.name(), "Telemetry sink rejected event");
                SinkStatus::Failure
            }
        }
    }

    /// Emits an event through the asynchronous sink path, resolving to a
    /// terminal status. Awaiting is best-effort delivery confirmation
    /// only; sink errors are swallowed.
    pub async fn emit_async(&self, event: EventProperties) -> SinkStatus {
        if !self.enabled {
            return SinkStatus::Ok;
        }
        let event = self.merge_context(event);
        match self.sink.log_event_async(&event).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, event = %event.name(), "Telemetry sink rejected event");
                SinkStatus::Failure
            }
        }
    }

    /// Emits an event without blocking the caller's completion path.
    ///
    /// Context is merged now, at emission time; the hand-off itself runs
    /// on a spawned task when a runtime is available and falls back to
    /// the synchronous path otherwise.
    pub fn emit_deferred(&self, event: EventProperties) {
        if !self.enabled {
            return;
        }
        let event = self.merge_context(event);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let sink = Arc::clone(&self.sink);
                handle.spawn(async move {
                    if let Err(e) = sink.log_event_async(&event).await {
                        tracing::warn!(error = %e, event = %event.name(), "Telemetry sink rejected event");
                    }
                });
            }
            Err(_) => {
                if let Err(e) = self.sink.log_event(&event) {
                    tracing::warn!(error = %e, event = %event.name(), "Telemetry sink rejected event");
                }
            }
        }
    }

    /// Wraps an operation, measures it, and emits exactly one event built
    /// from its outcome.
    ///
    /// The operation's own result is returned **unchanged**; the `build`
    /// closure receives the result and the derived outcome so
    /// operation-specific properties can reflect completed state. A
    /// malformed event (duplicate keys) is a call-site programming error
    /// and is reported loudly, but still never alters the wrapped
    /// operation's result.
    pub fn instrument<T, E, F, B>(&self, op: F, build: B) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: Display,
        B: FnOnce(&Result<T, E>, &OperationOutcome) -> Result<EventProperties, DomainError>,
    {
        let (result, outcome) = timing::run_timed(op);
        self.emit_built(build(&result, &outcome));
        result
    }

    /// The async twin of [`Self::instrument`].
    pub async fn instrument_async<T, E, Fut, B>(&self, fut: Fut, build: B) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        B: FnOnce(&Result<T, E>, &OperationOutcome) -> Result<EventProperties, DomainError>,
    {
        let (result, outcome) = timing::run_timed_async(fut).await;
        self.emit_built(build(&result, &outcome));
        result
    }

    fn emit_built(&self, event: Result<EventProperties, DomainError>) {
        match event {
            Ok(event) => {
                self.emit(event);
            }
            Err(e) => {
                tracing::error!(error = %e, "Malformed telemetry event dropped");
            }
        }
    }
}
