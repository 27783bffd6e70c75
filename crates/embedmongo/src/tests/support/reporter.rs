use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use embedmongo_engine::EngineVersion;
use serde_json::Value;

use crate::errors::OrchestratorError;
use crate::reporter::OrchestrationReporter;

#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    UnknownVersion(String),
    Launching { port: u16 },
    Launched { pid: u32, port: u16 },
    StartFailed(String),
    ReplicaSetInitiated(Value),
    ImportStarted(PathBuf),
    ImportFinished { file: PathBuf, code: i32 },
    ScriptEvaluated { database: String, file: PathBuf },
    Stopped(u32),
}

#[derive(Debug, Default, Clone)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<ReportEvent>>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().expect("reporter lock").clone()
    }

    fn record(&self, event: ReportEvent) {
        self.events.lock().expect("reporter lock").push(event);
    }
}

impl OrchestrationReporter for RecordingReporter {
    fn unknown_version(&self, raw: &str) {
        self.record(ReportEvent::UnknownVersion(raw.to_owned()));
    }

    fn launching(&self, _version: &EngineVersion, port: u16) {
        self.record(ReportEvent::Launching { port });
    }

    fn launched(&self, pid: u32, port: u16) {
        self.record(ReportEvent::Launched { pid, port });
    }

    fn start_failed(&self, error: &OrchestratorError) {
        self.record(ReportEvent::StartFailed(error.to_string()));
    }

    fn replica_set_initiated(&self, command: &Value) {
        self.record(ReportEvent::ReplicaSetInitiated(command.clone()));
    }

    fn import_started(&self, file: &Path, _database: &str, _collection: &str) {
        self.record(ReportEvent::ImportStarted(file.to_path_buf()));
    }

    fn import_finished(&self, file: &Path, code: i32) {
        self.record(ReportEvent::ImportFinished {
            file: file.to_path_buf(),
            code,
        });
    }

    fn script_evaluated(&self, database: &str, file: &Path) {
        self.record(ReportEvent::ScriptEvaluated {
            database: database.to_owned(),
            file: file.to_path_buf(),
        });
    }

    fn stopped(&self, pid: u32) {
        self.record(ReportEvent::Stopped(pid));
    }
}
