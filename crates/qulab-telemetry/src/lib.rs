//! Qulab Telemetry - Usage-event pipeline for the kernel
//!
//! Provides:
//! - `TelemetryService`: event emission, context seeding, duration wrapping
//! - `ContextStore`: process-wide typed context merged into every event
//! - `CaptureSink`: in-memory ordered event log for test assertions
//! - `HttpSink`: best-effort forwarding to a collector endpoint
//! - `PerformanceSampler`: periodic background kernel-performance events
//! - Event catalogue builders for every instrumented kernel operation
//!
//! Telemetry is a side-effect layer: a sink failure is swallowed and never
//! reaches the instrumented operation's caller.

pub mod capture;
pub mod context;
pub mod device;
pub mod events;
pub mod http;
pub mod sampler;
pub mod service;
pub mod timing;

pub use capture::CaptureSink;
pub use context::{ContextEntry, ContextStore};
pub use http::HttpSink;
pub use sampler::PerformanceSampler;
pub use service::{KernelVersions, TelemetryService};
pub use timing::{
    format_duration, parse_duration, run_timed, run_timed_async, OperationOutcome,
    OperationStatus, Stopwatch,
};
