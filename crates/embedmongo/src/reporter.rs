//! Structured reporting of orchestration lifecycle events.

use std::path::Path;
use std::sync::Arc;

use embedmongo_engine::EngineVersion;
use serde_json::Value;

use crate::errors::OrchestratorError;

const REPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Observer notified as orchestration progresses.
pub trait OrchestrationReporter: Send + Sync {
    /// A version string was not recognised and will be attempted verbatim.
    fn unknown_version(&self, raw: &str);

    /// The engine is about to be launched.
    fn launching(&self, version: &EngineVersion, port: u16);

    /// The engine accepts connections.
    fn launched(&self, pid: u32, port: u16);

    /// Start failed.
    fn start_failed(&self, error: &OrchestratorError);

    /// The replica set was initiated.
    fn replica_set_initiated(&self, command: &Value);

    /// An import process was launched.
    fn import_started(&self, file: &Path, database: &str, collection: &str);

    /// An import process exited successfully.
    fn import_finished(&self, file: &Path, code: i32);

    /// An initialization script was evaluated successfully.
    fn script_evaluated(&self, database: &str, file: &Path);

    /// The engine was stopped.
    fn stopped(&self, pid: u32);
}

impl<T> OrchestrationReporter for Arc<T>
where
    T: OrchestrationReporter + ?Sized,
{
    fn unknown_version(&self, raw: &str) {
        (**self).unknown_version(raw);
    }

    fn launching(&self, version: &EngineVersion, port: u16) {
        (**self).launching(version, port);
    }

    fn launched(&self, pid: u32, port: u16) {
        (**self).launched(pid, port);
    }

    fn start_failed(&self, error: &OrchestratorError) {
        (**self).start_failed(error);
    }

    fn replica_set_initiated(&self, command: &Value) {
        (**self).replica_set_initiated(command);
    }

    fn import_started(&self, file: &Path, database: &str, collection: &str) {
        (**self).import_started(file, database, collection);
    }

    fn import_finished(&self, file: &Path, code: i32) {
        (**self).import_finished(file, code);
    }

    fn script_evaluated(&self, database: &str, file: &Path) {
        (**self).script_evaluated(database, file);
    }

    fn stopped(&self, pid: u32) {
        (**self).stopped(pid);
    }
}

/// Default reporter that records events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredReporter;

impl OrchestrationReporter for StructuredReporter {
    fn unknown_version(&self, raw: &str) {
        tracing::warn!(
            target: REPORT_TARGET,
            event = "unknown_version",
            version = raw,
            "unrecognised MongoDB version, this might be a new version; attempting download anyway"
        );
    }

    fn launching(&self, version: &EngineVersion, port: u16) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "launching",
            version = %version,
            port,
            "launching mongod"
        );
    }

    fn launched(&self, pid: u32, port: u16) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "launched",
            pid,
            port,
            "mongod is running"
        );
    }

    fn start_failed(&self, error: &OrchestratorError) {
        tracing::error!(
            target: REPORT_TARGET,
            event = "start_failed",
            error = %error,
            "start failed"
        );
    }

    fn replica_set_initiated(&self, command: &Value) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "replica_set_initiated",
            command = %command,
            "replica set initiated"
        );
    }

    fn import_started(&self, file: &Path, database: &str, collection: &str) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "import_started",
            file = %file.display(),
            database,
            collection,
            "import launched"
        );
    }

    fn import_finished(&self, file: &Path, code: i32) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "import_finished",
            file = %file.display(),
            code,
            "import return code: {code}"
        );
    }

    fn script_evaluated(&self, database: &str, file: &Path) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "script_evaluated",
            database,
            file = %file.display(),
            "file parsed successfully"
        );
    }

    fn stopped(&self, pid: u32) {
        tracing::info!(
            target: REPORT_TARGET,
            event = "stopped",
            pid,
            "mongod stopped"
        );
    }
}
