//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ITelemetrySink`] - Consumer of emitted telemetry events (capture
//!   double for tests, HTTP forwarder for a real backend)

pub mod telemetry_sink;

pub use telemetry_sink::{ITelemetrySink, SinkStatus};
