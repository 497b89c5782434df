//! Integration test: instrumented kernel collaborators → TelemetryService
//! → CaptureSink
//!
//! Drives fake versions of the workspace loader, compiler, package
//! manager, command dispatcher, and simulator through the telemetry
//! service and asserts on the exact captured event sequences.

use std::sync::Arc;
use std::time::Duration;

use qulab_core::config::ConfigBuilder;
use qulab_core::domain::{DeviceId, PiiKind, Value};
use qulab_core::ports::ITelemetrySink;
use qulab_telemetry::service::{
    CONTEXT_APP_ID, CONTEXT_APP_VERSION, CONTEXT_COMPILER_VERSION, CONTEXT_DEVICE_ID,
    CONTEXT_HOSTING_ENVIRONMENT, CONTEXT_SIMULATOR_VERSION, CONTEXT_USER_AGENT,
};
use qulab_telemetry::{
    events, parse_duration, CaptureSink, KernelVersions, Stopwatch, TelemetryService,
};

fn make_service() -> (Arc<CaptureSink>, TelemetryService) {
    let sink = Arc::new(CaptureSink::new());
    let config = ConfigBuilder::new()
        .user_agent("TestUserAgent")
        .hosting_environment("TestHostingEnvironment")
        .build()
        .telemetry;
    let service = TelemetryService::with_device_id(
        Arc::clone(&sink) as Arc<dyn ITelemetrySink>,
        &config,
        &KernelVersions::new("0.1.0", "2.4.0", "1.7.2"),
        DeviceId::new(),
    );
    (sink, service)
}

fn str_prop(event: &qulab_core::domain::EventProperties, suffix: &str) -> Option<String> {
    event
        .property(&events::property_key(suffix))
        .and_then(Value::as_str)
        .map(String::from)
}

fn int_prop(event: &qulab_core::domain::EventProperties, suffix: &str) -> Option<i64> {
    event
        .property(&events::property_key(suffix))
        .and_then(Value::as_integer)
}

fn assert_positive_duration(event: &qulab_core::domain::EventProperties) {
    let duration = str_prop(event, "Duration")
        .unwrap_or_else(|| panic!("{} has no Duration", event.name()));
    assert!(
        parse_duration(&duration).unwrap() > Duration::ZERO,
        "Duration must be > 0, got {duration}"
    );
}

// ============================================================================
// Fake kernel collaborators
// ============================================================================

struct FakeProject {
    uri: String,
    source_files: i64,
    project_refs: i64,
    package_refs: i64,
}

struct FakeWorkspace {
    name: String,
    file_count: i64,
    packages: Vec<(String, String)>,
    projects: Vec<FakeProject>,
    broken: bool,
}

impl FakeWorkspace {
    fn simple(name: &str) -> Self {
        Self {
            name: name.to_string(),
            file_count: 2,
            packages: Vec::new(),
            projects: Vec::new(),
            broken: false,
        }
    }

    /// Reloads the workspace, resolving packages and projects first, the
    /// way the kernel's workspace loader does.
    fn reload(&self, telemetry: &TelemetryService) -> Result<(), String> {
        telemetry.instrument(
            || {
                for (id, version) in &self.packages {
                    let watch = Stopwatch::start();
                    let event = events::package_load(id, version, watch.elapsed())
                        .expect("package event");
                    telemetry.emit(event);
                }
                for project in &self.projects {
                    let watch = Stopwatch::start();
                    let event = events::project_load(
                        &project.uri,
                        project.source_files,
                        project.project_refs,
                        project.package_refs,
                        false,
                        watch.elapsed(),
                    )
                    .expect("project event");
                    telemetry.emit(event);
                }
                if self.broken {
                    Err("QS1001: unexpected token in Broken.qs".to_string())
                } else {
                    Ok(())
                }
            },
            |_, outcome| {
                events::workspace_reload(
                    &self.name,
                    outcome,
                    self.file_count,
                    self.projects.len() as i64,
                )
            },
        )
    }
}

fn compile_snippet(
    telemetry: &TelemetryService,
    namespaces: &[&str],
    fail: bool,
) -> Result<Vec<String>, String> {
    telemetry.instrument(
        || {
            if fail {
                Err("QS6301: expected identifier".to_string())
            } else {
                Ok(namespaces.iter().map(|s| s.to_string()).collect())
            }
        },
        |result, outcome| events::compile(outcome, result.as_deref().unwrap_or_default()),
    )
}

struct FakeSimulator {
    name: String,
}

impl FakeSimulator {
    fn run(&self, telemetry: &TelemetryService, n_qubits: i64) {
        let watch = Stopwatch::start();
        // the simulated program would execute here
        let event = events::simulator_performance(&self.name, n_qubits, watch.elapsed())
            .expect("simulator event");
        telemetry.emit(event);
    }
}

/// Dispatches a magic command the way the kernel's command dispatcher
/// does: the `Action` event is emitted only once the full command,
/// including anything it triggered, has completed.
fn execute_magic(telemetry: &TelemetryService, command: &str) -> Result<(), String> {
    telemetry.instrument(
        || match command {
            "%simulate" => {
                let simulator = FakeSimulator {
                    name: "FullStateSimulator".to_string(),
                };
                simulator.run(telemetry, 0);
                Ok(())
            }
            "%package" => {
                let watch = Stopwatch::start();
                let event =
                    events::package_load("Qulab.Standard", "0.28.3", watch.elapsed())
                        .expect("package event");
                telemetry.emit(event);
                Ok(())
            }
            _ => Err(format!("unknown magic command: {command}")),
        },
        |_, outcome| events::action(command, outcome),
    )
}

// ============================================================================
// Sequence assertions
// ============================================================================

#[test]
fn simple_workspace_reload_emits_one_event() {
    let (sink, telemetry) = make_service();
    let workspace = FakeWorkspace::simple("Workspace");

    workspace.reload(&telemetry).unwrap();

    let captured = sink.events();
    assert_eq!(captured.len(), 1);
    let event = &captured[0];
    assert_eq!(event.name(), events::WORKSPACE_RELOAD);
    assert_eq!(str_prop(event, "Workspace").as_deref(), Some("Workspace"));
    assert_eq!(
        event.pii_kind(&events::property_key("Workspace")),
        Some(PiiKind::GenericData)
    );
    assert_eq!(str_prop(event, "Status").as_deref(), Some("ok"));
    assert_eq!(str_prop(event, "Errors").as_deref(), Some(""));
    assert_eq!(int_prop(event, "FileCount"), Some(2));
    assert_eq!(int_prop(event, "ProjectCount"), Some(0));
    assert_positive_duration(event);
}

#[test]
fn broken_workspace_reload_reports_error_and_reraises() {
    let (sink, telemetry) = make_service();
    let workspace = FakeWorkspace {
        broken: true,
        ..FakeWorkspace::simple("Workspace.Broken")
    };

    let err = workspace.reload(&telemetry).unwrap_err();
    assert!(err.starts_with("QS"));

    let captured = sink.events();
    assert_eq!(captured.len(), 1);
    let event = &captured[0];
    assert_eq!(str_prop(event, "Workspace").as_deref(), Some("Workspace.Broken"));
    assert_eq!(str_prop(event, "Status").as_deref(), Some("error"));
    assert!(str_prop(event, "Errors").unwrap().starts_with("QS"));
    assert_eq!(int_prop(event, "FileCount"), Some(2));
    assert_positive_duration(event);
}

#[test]
fn repeated_compiles_capture_in_completion_order() {
    let (sink, telemetry) = make_service();

    compile_snippet(&telemetry, &["Qulab.Canon"], false).unwrap();
    compile_snippet(&telemetry, &["Qulab.Canon", "Qulab.Intrinsic"], false).unwrap();
    compile_snippet(&telemetry, &[], true).unwrap_err();
    compile_snippet(&telemetry, &["Qulab.Diagnostics"], false).unwrap();

    let captured = sink.events();
    assert_eq!(captured.len(), 4);
    for event in &captured {
        assert_eq!(event.name(), events::COMPILE);
        assert_positive_duration(event);
    }
    assert_eq!(str_prop(&captured[0], "Status").as_deref(), Some("ok"));
    assert_eq!(
        str_prop(&captured[1], "Namespaces").as_deref(),
        Some("Qulab.Canon,Qulab.Intrinsic")
    );
    assert_eq!(str_prop(&captured[2], "Status").as_deref(), Some("error"));
    assert!(str_prop(&captured[2], "Errors").unwrap().starts_with("QS"));
    assert_eq!(str_prop(&captured[3], "Status").as_deref(), Some("ok"));
}

#[test]
fn project_reload_emits_nested_events_before_enclosing() {
    let (sink, telemetry) = make_service();
    let workspace = FakeWorkspace {
        name: "Workspace.ProjectReferences".to_string(),
        file_count: 3,
        packages: vec![("Qulab.Testing".to_string(), "0.28.3".to_string())],
        projects: vec![
            FakeProject {
                uri: "file:///work/ProjectB.yml".to_string(),
                source_files: 1,
                project_refs: 0,
                package_refs: 0,
            },
            FakeProject {
                uri: "file:///work/ProjectA.yml".to_string(),
                source_files: 1,
                project_refs: 1,
                package_refs: 0,
            },
            FakeProject {
                uri: "file:///work/Workspace.ProjectReferences.yml".to_string(),
                source_files: 1,
                project_refs: 3,
                package_refs: 1,
            },
        ],
        broken: false,
    };

    workspace.reload(&telemetry).unwrap();

    // packages + projects + the enclosing reload, in causal order
    let captured = sink.events();
    assert_eq!(captured.len(), 5);

    assert_eq!(captured[0].name(), events::PACKAGE_LOAD);
    assert_eq!(
        str_prop(&captured[0], "PackageId").as_deref(),
        Some("Qulab.Testing")
    );
    assert_positive_duration(&captured[0]);

    for (event, project) in captured[1..4].iter().zip(&workspace.projects) {
        assert_eq!(event.name(), events::PROJECT_LOAD);
        assert_eq!(str_prop(event, "ProjectUri").as_deref(), Some(project.uri.as_str()));
        assert_eq!(
            event.pii_kind(&events::property_key("ProjectUri")),
            Some(PiiKind::Uri)
        );
        assert_eq!(int_prop(event, "SourceFileCount"), Some(project.source_files));
        assert_eq!(int_prop(event, "ProjectReferenceCount"), Some(project.project_refs));
        assert_eq!(int_prop(event, "PackageReferenceCount"), Some(project.package_refs));
        assert_eq!(
            event
                .property(&events::property_key("UserAdded"))
                .and_then(Value::as_bool),
            Some(false)
        );
    }

    let reload = &captured[4];
    assert_eq!(reload.name(), events::WORKSPACE_RELOAD);
    assert_eq!(str_prop(reload, "Status").as_deref(), Some("ok"));
    assert_eq!(int_prop(reload, "FileCount"), Some(3));
    assert_eq!(int_prop(reload, "ProjectCount"), Some(3));
}

#[test]
fn simulate_magic_emits_simulator_before_action() {
    let (sink, telemetry) = make_service();

    execute_magic(&telemetry, "%simulate").unwrap();

    let captured = sink.events();
    assert_eq!(captured.len(), 2);

    assert_eq!(captured[0].name(), events::SIMULATOR_PERFORMANCE);
    assert_eq!(
        str_prop(&captured[0], "SimulatorName").as_deref(),
        Some("FullStateSimulator")
    );
    assert_eq!(int_prop(&captured[0], "NQubits"), Some(0));
    assert_positive_duration(&captured[0]);

    // The Action event is raised only when the command completes, so it
    // is observed after the simulator performance event.
    assert_eq!(captured[1].name(), events::ACTION);
    assert_eq!(str_prop(&captured[1], "Command").as_deref(), Some("%simulate"));
    assert_eq!(str_prop(&captured[1], "Status").as_deref(), Some("Ok"));
    assert_positive_duration(&captured[1]);
}

#[test]
fn package_magic_emits_package_before_action() {
    let (sink, telemetry) = make_service();

    execute_magic(&telemetry, "%package").unwrap();

    let captured = sink.events();
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0].name(), events::PACKAGE_LOAD);
    assert_eq!(
        str_prop(&captured[0], "PackageId").as_deref(),
        Some("Qulab.Standard")
    );
    assert!(!str_prop(&captured[0], "PackageVersion").unwrap().is_empty());
    assert_eq!(captured[1].name(), events::ACTION);
    assert_eq!(str_prop(&captured[1], "Command").as_deref(), Some("%package"));
}

#[test]
fn failing_command_keeps_error_and_reports_error_status() {
    let (sink, telemetry) = make_service();

    let err = execute_magic(&telemetry, "%frobnicate").unwrap_err();
    assert!(err.contains("%frobnicate"));

    let captured = sink.events();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].name(), events::ACTION);
    assert_eq!(str_prop(&captured[0], "Status").as_deref(), Some("Error"));
}

#[test]
fn background_samples_filter_out_of_assertions() {
    let (sink, telemetry) = make_service();

    // Interleave nondeterministic background samples with a user flow.
    telemetry.emit(events::kernel_performance(1024, Duration::from_secs(1)).unwrap());
    compile_snippet(&telemetry, &["Qulab.Canon"], false).unwrap();
    telemetry.emit(events::kernel_performance(2048, Duration::from_secs(2)).unwrap());
    execute_magic(&telemetry, "%simulate").unwrap();
    telemetry.emit(events::kernel_performance(4096, Duration::from_secs(3)).unwrap());

    let deterministic = sink.events_excluding(events::KERNEL_PERFORMANCE);
    let names: Vec<&str> = deterministic
        .iter()
        .map(|event| event.name().as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            events::COMPILE,
            events::SIMULATOR_PERFORMANCE,
            events::ACTION,
        ]
    );
}

#[test]
fn context_is_seeded_and_attached_to_events() {
    let (sink, telemetry) = make_service();

    // Seeded context is recorded on the sink, as the backend would see it
    let context_str = |key: &str| {
        sink.context_value(key)
            .and_then(|v| v.as_str().map(String::from))
    };
    assert_eq!(context_str(CONTEXT_APP_ID).as_deref(), Some("qulab"));
    assert_eq!(context_str(CONTEXT_APP_VERSION).as_deref(), Some("0.1.0"));
    assert_eq!(context_str(CONTEXT_COMPILER_VERSION).as_deref(), Some("2.4.0"));
    assert_eq!(context_str(CONTEXT_SIMULATOR_VERSION).as_deref(), Some("1.7.2"));
    assert_eq!(context_str(CONTEXT_USER_AGENT).as_deref(), Some("TestUserAgent"));
    assert_eq!(
        context_str(CONTEXT_HOSTING_ENVIRONMENT).as_deref(),
        Some("TestHostingEnvironment")
    );
    assert!(sink.context_value(CONTEXT_DEVICE_ID).is_some());

    // ...and merged into every emitted event's property bag.
    compile_snippet(&telemetry, &[], false).unwrap();
    let captured = sink.events();
    let event = &captured[0];
    assert_eq!(
        event.property(CONTEXT_APP_ID).and_then(Value::as_str),
        Some("qulab")
    );
    assert_eq!(
        event.property(CONTEXT_USER_AGENT).and_then(Value::as_str),
        Some("TestUserAgent")
    );
}

#[test]
fn later_context_does_not_rewrite_captured_events() {
    let (sink, telemetry) = make_service();

    compile_snippet(&telemetry, &[], false).unwrap();
    telemetry.set_context(CONTEXT_USER_AGENT, "changed", PiiKind::None);
    compile_snippet(&telemetry, &[], false).unwrap();

    let captured = sink.events();
    assert_eq!(
        captured[0].property(CONTEXT_USER_AGENT).and_then(Value::as_str),
        Some("TestUserAgent")
    );
    assert_eq!(
        captured[1].property(CONTEXT_USER_AGENT).and_then(Value::as_str),
        Some("changed")
    );
}

#[tokio::test]
async fn async_command_dispatch_preserves_ordering() {
    let (sink, telemetry) = make_service();

    telemetry
        .instrument_async(
            async {
                let simulator = FakeSimulator {
                    name: "SparseSimulator".to_string(),
                };
                simulator.run(&telemetry, 12);
                Ok::<_, String>(())
            },
            |_, outcome| events::action("%simulate", outcome),
        )
        .await
        .unwrap();

    let captured = sink.events();
    let names: Vec<&str> = captured.iter().map(|event| event.name().as_str()).collect();
    assert_eq!(names, vec![events::SIMULATOR_PERFORMANCE, events::ACTION]);
}
