//! Command-line runs against a scripted engine and an in-memory slot.

use std::ffi::OsString;
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::support::{FakeEngine, FixedPorts, ImmediateSignal, RecordingNetwork, RecordingReporter};
use crate::handoff::{HandoffSlot, InMemoryHandoff};
use crate::orchestrator::Orchestrator;
use crate::run_with;

struct Run {
    code: ExitCode,
    stdout: String,
    stderr: String,
}

struct Workspace {
    dir: TempDir,
    engine: FakeEngine,
    orchestrator: Orchestrator,
    slot: Arc<InMemoryHandoff>,
}

impl Workspace {
    fn config(&self, contents: &str) -> String {
        let path = self.dir.path().join("embedmongo.toml");
        fs::write(&path, contents).expect("write config");
        path.to_str().expect("utf-8 path").to_owned()
    }

    fn run(&self, args: &[&str]) -> Run {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let slot = Arc::clone(&self.slot);
        let args = std::iter::once("embedmongo")
            .chain(args.iter().copied())
            .map(OsString::from);
        let code = run_with(args, &mut stdout, &mut stderr, &self.orchestrator, move |_| {
            let slot: Arc<dyn HandoffSlot> = slot;
            slot
        });
        Run {
            code,
            stdout: String::from_utf8(stdout).expect("utf-8 stdout"),
            stderr: String::from_utf8(stderr).expect("utf-8 stderr"),
        }
    }
}

#[fixture]
fn workspace() -> Workspace {
    let engine = FakeEngine::default();
    let orchestrator = Orchestrator::new(
        Arc::new(engine.clone()),
        Arc::new(RecordingNetwork::default()),
        Arc::new(FixedPorts::new(41000)),
        Arc::new(RecordingReporter::default()),
        Arc::new(ImmediateSignal::default()),
    );
    Workspace {
        dir: tempfile::tempdir().expect("workspace"),
        engine,
        orchestrator,
        slot: Arc::new(InMemoryHandoff::default()),
    }
}

#[rstest]
fn start_prints_port_and_stop_succeeds(workspace: Workspace) {
    let config = workspace.config("");

    let started = workspace.run(&["--config-path", &config, "--port", "37017", "start"]);
    assert_eq!(started.code, ExitCode::SUCCESS, "stderr: {}", started.stderr);
    assert_eq!(started.stdout, "mongodb.port=37017\n");

    let stopped = workspace.run(&["--config-path", &config, "stop"]);
    assert_eq!(stopped.code, ExitCode::SUCCESS, "stderr: {}", stopped.stderr);
    assert!(stopped.stdout.is_empty());
}

#[rstest]
fn random_port_flag_publishes_allocated_port(workspace: Workspace) {
    let config = workspace.config("");

    let run = workspace.run(&["--config-path", &config, "--random-port", "start"]);

    assert_eq!(run.code, ExitCode::SUCCESS, "stderr: {}", run.stderr);
    assert_eq!(run.stdout, "mongodb.port=41000\n");
}

#[rstest]
fn port_file_from_config_receives_property(workspace: Workspace) {
    let port_file = workspace.dir.path().join("target").join("mongo.properties");
    let config = workspace.config(&format!(
        "port = 27123\nport_file = \"{}\"\n",
        port_file.display()
    ));

    let run = workspace.run(&["--config-path", &config, "start"]);

    assert_eq!(run.code, ExitCode::SUCCESS, "stderr: {}", run.stderr);
    assert_eq!(
        fs::read_to_string(port_file).expect("port file"),
        "mongodb.port=27123\n"
    );
}

#[rstest]
fn stop_without_start_fails(workspace: Workspace) {
    let config = workspace.config("");

    let run = workspace.run(&["--config-path", &config, "stop"]);

    assert_eq!(run.code, ExitCode::FAILURE);
    assert!(run.stderr.contains("no mongod process found"), "stderr: {}", run.stderr);
}

#[rstest]
fn skip_flag_short_circuits(workspace: Workspace) {
    let config = workspace.config("");

    let run = workspace.run(&["--config-path", &config, "--skip", "start"]);

    assert_eq!(run.code, ExitCode::SUCCESS);
    assert!(run.stdout.is_empty());
    assert!(workspace.engine.calls().is_empty());
}

#[rstest]
fn invalid_import_job_is_reported(workspace: Workspace) {
    let config = workspace.config("[[imports]]\nfile = \"users.json\"\ncollection = \"users\"\n");

    let run = workspace.run(&["--config-path", &config, "start"]);

    assert_eq!(run.code, ExitCode::FAILURE);
    assert!(run.stderr.contains("users.json"), "stderr: {}", run.stderr);
    assert!(run.stderr.contains("database is required"));
    assert!(workspace.engine.calls().is_empty());
}

#[rstest]
fn missing_config_file_is_reported(workspace: Workspace) {
    let missing = workspace.dir.path().join("absent.toml");

    let run = workspace.run(&["--config-path", missing.to_str().expect("utf-8"), "start"]);

    assert_eq!(run.code, ExitCode::FAILURE);
    assert!(run.stderr.starts_with("embedmongo: "));
    assert!(run.stderr.contains("absent.toml"));
}

#[rstest]
fn unknown_flag_is_a_usage_error(workspace: Workspace) {
    let run = workspace.run(&["--frobnicate", "start"]);

    assert_eq!(run.code, ExitCode::from(2));
    assert!(run.stderr.contains("--frobnicate"));
}

#[rstest]
fn help_goes_to_stdout(workspace: Workspace) {
    let run = workspace.run(&["--help"]);

    assert_eq!(run.code, ExitCode::SUCCESS);
    assert!(run.stdout.contains("Usage"));
    assert!(run.stderr.is_empty());
}
