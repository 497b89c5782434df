//! Qulab Core - Domain logic for the kernel's telemetry pipeline
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `EventProperties`, `Value`, `PiiKind`, validated newtypes
//! - **Port definitions** - Traits for adapters: `ITelemetrySink`
//! - **Configuration** - Typed YAML configuration with validation and a builder
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure event modeling with no I/O dependencies.
//! Ports define trait interfaces that adapter crates implement; the
//! `qulab-telemetry` crate provides the capture and HTTP sink adapters and
//! the orchestrating service.

pub mod config;
pub mod domain;
pub mod ports;
