//! Event catalogue
//!
//! Builders for every event the kernel emits. Each builder is a pure
//! function returning `Result`, so a malformed property set fails at the
//! call site instead of silently dropping data. PII-bearing fields
//! (workspace names, project URIs) are classified here, in one place,
//! rather than at each call site.

use std::time::Duration;

use qulab_core::domain::{DomainError, EventName, EventProperties, PiiKind};

use crate::timing::{format_duration, OperationOutcome, OperationStatus};

/// Prefix shared by every event name and property key.
pub const EVENT_PREFIX: &str = "Qulab.Kernel.";

/// Workspace reload completed (successfully or not).
pub const WORKSPACE_RELOAD: &str = "Qulab.Kernel.WorkspaceReload";
/// A snippet or file compilation completed.
pub const COMPILE: &str = "Qulab.Kernel.Compile";
/// A package was resolved and loaded.
pub const PACKAGE_LOAD: &str = "Qulab.Kernel.PackageLoad";
/// A project file was loaded while resolving references.
pub const PROJECT_LOAD: &str = "Qulab.Kernel.ProjectLoad";
/// A user-invoked magic command completed.
pub const ACTION: &str = "Qulab.Kernel.Action";
/// A simulator run completed.
pub const SIMULATOR_PERFORMANCE: &str = "Qulab.Kernel.SimulatorPerformance";
/// Periodic background performance sample.
pub const KERNEL_PERFORMANCE: &str = "Qulab.Kernel.KernelPerformance";

/// Builds the fully-prefixed form of a property key.
pub fn property_key(suffix: &str) -> String {
    format!("{EVENT_PREFIX}{suffix}")
}

/// Base event carrying the uniform Status/Errors/Duration triad.
fn outcome_event(name: &str, outcome: &OperationOutcome) -> Result<EventProperties, DomainError> {
    EventProperties::new(EventName::new(name)?)
        .with_property(property_key("Status"), outcome.status.as_str())?
        .with_property(property_key("Errors"), outcome.errors.clone())?
        .with_property(property_key("Duration"), format_duration(outcome.duration))
}

/// `WorkspaceReload`: emitted when a workspace reload completes.
///
/// The workspace name may reveal a user directory name, so it is
/// classified as generic PII.
pub fn workspace_reload(
    workspace: &str,
    outcome: &OperationOutcome,
    file_count: i64,
    project_count: i64,
) -> Result<EventProperties, DomainError> {
    outcome_event(WORKSPACE_RELOAD, outcome)?
        .with_pii_property(property_key("Workspace"), workspace, PiiKind::GenericData)?
        .with_property(property_key("FileCount"), file_count)?
        .with_property(property_key("ProjectCount"), project_count)
}

/// `Compile`: emitted when a compilation completes.
///
/// `namespaces` lists the namespaces opened by the compiled code; the
/// property carries them comma-joined in sorted order.
pub fn compile(
    outcome: &OperationOutcome,
    namespaces: &[String],
) -> Result<EventProperties, DomainError> {
    let mut sorted = namespaces.to_vec();
    sorted.sort();
    outcome_event(COMPILE, outcome)?
        .with_property(property_key("Namespaces"), sorted.join(","))
}

/// `PackageLoad`: emitted when a package finishes loading.
pub fn package_load(
    package_id: &str,
    package_version: &str,
    duration: Duration,
) -> Result<EventProperties, DomainError> {
    EventProperties::new(EventName::new(PACKAGE_LOAD)?)
        .with_property(property_key("PackageId"), package_id)?
        .with_property(property_key("PackageVersion"), package_version)?
        .with_property(property_key("Duration"), format_duration(duration))
}

/// `ProjectLoad`: emitted when a project file finishes loading.
///
/// The project URI contains user paths and is classified accordingly.
pub fn project_load(
    project_uri: &str,
    source_file_count: i64,
    project_reference_count: i64,
    package_reference_count: i64,
    user_added: bool,
    duration: Duration,
) -> Result<EventProperties, DomainError> {
    EventProperties::new(EventName::new(PROJECT_LOAD)?)
        .with_pii_property(property_key("ProjectUri"), project_uri, PiiKind::Uri)?
        .with_property(property_key("SourceFileCount"), source_file_count)?
        .with_property(property_key("ProjectReferenceCount"), project_reference_count)?
        .with_property(property_key("PackageReferenceCount"), package_reference_count)?
        .with_property(property_key("UserAdded"), user_added)?
        .with_property(property_key("Duration"), format_duration(duration))
}

/// `Action`: emitted when a user-invoked command completes.
///
/// Command actions report their status in the operation-specific
/// `Ok`/`Error` form rather than the lowercase triad form.
pub fn action(command: &str, outcome: &OperationOutcome) -> Result<EventProperties, DomainError> {
    let status = match outcome.status {
        OperationStatus::Ok => "Ok",
        OperationStatus::Error => "Error",
    };
    EventProperties::new(EventName::new(ACTION)?)
        .with_property(property_key("Command"), command)?
        .with_property(property_key("Status"), status)?
        .with_property(property_key("Duration"), format_duration(outcome.duration))
}

/// `SimulatorPerformance`: emitted when a simulator run completes.
pub fn simulator_performance(
    simulator_name: &str,
    n_qubits: i64,
    duration: Duration,
) -> Result<EventProperties, DomainError> {
    EventProperties::new(EventName::new(SIMULATOR_PERFORMANCE)?)
        .with_property(property_key("SimulatorName"), simulator_name)?
        .with_property(property_key("NQubits"), n_qubits)?
        .with_property(property_key("Duration"), format_duration(duration))
}

/// `KernelPerformance`: periodic background sample of process health.
pub fn kernel_performance(
    ram_used_bytes: i64,
    uptime: Duration,
) -> Result<EventProperties, DomainError> {
    EventProperties::new(EventName::new(KERNEL_PERFORMANCE)?)
        .with_property(property_key("RamUsedBytes"), ram_used_bytes)?
        .with_property(property_key("UptimeSeconds"), uptime.as_secs_f64())
}
