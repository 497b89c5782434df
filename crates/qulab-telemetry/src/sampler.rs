//! Background kernel-performance sampling
//!
//! An independent periodic task that emits `KernelPerformance` events
//! while the kernel session runs. Sampling is gated by an explicit
//! configuration switch (off by default) so test runs observe a
//! deterministic event sequence; the capture sink's name filtering is the
//! second line of defense when sampling is on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use qulab_core::config::SamplerConfig;
use tokio_util::sync::CancellationToken;

use crate::events;
use crate::service::TelemetryService;

/// Assumed when the kernel cannot query the actual page size.
const PAGE_SIZE_BYTES: i64 = 4096;

/// Handle to the periodic performance-sampling task
///
/// The task emits one sample immediately on start, then one per
/// configured interval, until [`PerformanceSampler::stop`] is called or
/// the handle is dropped.
pub struct PerformanceSampler {
    shutdown: CancellationToken,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl PerformanceSampler {
    /// Starts the sampling task when the configuration enables it.
    ///
    /// Must be called within a Tokio runtime. With sampling disabled this
    /// returns an inert handle and spawns nothing.
    pub fn start(service: Arc<TelemetryService>, config: &SamplerConfig) -> Self {
        let shutdown = CancellationToken::new();
        if !config.enabled {
            return Self {
                shutdown,
                handle: None,
            };
        }

        let token = shutdown.clone();
        let interval = Duration::from_secs(config.interval_secs.max(1));
        let session_started = Instant::now();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        match events::kernel_performance(
                            resident_memory_bytes(),
                            session_started.elapsed(),
                        ) {
                            Ok(event) => {
                                service.emit_async(event).await;
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to build performance sample");
                            }
                        }
                    }
                }
            }
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Signals the sampling task to stop. Idempotent.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Whether the sampling task is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for PerformanceSampler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Resident memory of this process in bytes; zero when unavailable.
fn resident_memory_bytes() -> i64 {
    std::fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|content| parse_statm_resident_bytes(&content))
        .unwrap_or(0)
}

/// Parses the resident-pages field (second column) of `/proc/self/statm`.
fn parse_statm_resident_bytes(statm: &str) -> Option<i64> {
    let resident_pages: i64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident_pages * PAGE_SIZE_BYTES)
}
