use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use embedmongo_engine::{
    AdminSession, ArtifactRetrievalConfig, CommandResult, DetachedProcess, Distribution, Engine,
    EngineError, EngineVersion, ImportProcess, ImportSpec, Launchable, Net, ProcessHandle,
    RunConfiguration, RuntimeSettings,
};
use serde_json::Value;

/// Process identifier reported by fake engine processes.
pub const FAKE_PID: u32 = 4242;

/// Calls observed by [`FakeEngine`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Resolve(String),
    Start { port: u16, args: Vec<String> },
    ImportLaunched(PathBuf),
    ImportJoined(PathBuf),
    ImportKilled(PathBuf),
    Admin(String),
    Command { database: String, command: Value },
    Eval { database: String, script: String },
    Stop(u32),
}

#[derive(Debug, Default)]
struct Behaviour {
    resolve_failure: Option<String>,
    start_failure: Option<String>,
    import_codes: HashMap<PathBuf, i32>,
    rejected_commands: Option<String>,
    failing_script: Option<(String, String)>,
}

/// Scriptable in-memory engine.
#[derive(Debug, Default, Clone)]
pub struct FakeEngine {
    calls: Arc<Mutex<Vec<EngineCall>>>,
    behaviour: Arc<Mutex<Behaviour>>,
}

impl FakeEngine {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn fail_resolve(&self, message: &str) -> &Self {
        self.behaviour().resolve_failure = Some(message.to_owned());
        self
    }

    pub fn fail_start(&self, message: &str) -> &Self {
        self.behaviour().start_failure = Some(message.to_owned());
        self
    }

    pub fn import_exit(&self, file: impl Into<PathBuf>, code: i32) -> &Self {
        self.behaviour().import_codes.insert(file.into(), code);
        self
    }

    pub fn reject_commands(&self, message: &str) -> &Self {
        self.behaviour().rejected_commands = Some(message.to_owned());
        self
    }

    /// Evaluations of scripts containing `marker` fail with `message`.
    pub fn fail_scripts_containing(&self, marker: &str, message: &str) -> &Self {
        self.behaviour().failing_script = Some((marker.to_owned(), message.to_owned()));
        self
    }

    fn behaviour(&self) -> std::sync::MutexGuard<'_, Behaviour> {
        self.behaviour.lock().expect("behaviour lock")
    }

    fn record(&self, call: EngineCall) {
        record(&self.calls, call);
    }
}

fn record(calls: &Mutex<Vec<EngineCall>>, call: EngineCall) {
    calls.lock().expect("calls lock").push(call);
}

fn failure(message: &str) -> EngineError {
    EngineError::Io {
        path: PathBuf::from("fake"),
        source: Arc::new(io::Error::other(message.to_owned())),
    }
}

impl Engine for FakeEngine {
    fn resolve(
        &self,
        version: &EngineVersion,
        _artifacts: &ArtifactRetrievalConfig,
    ) -> Result<Distribution, EngineError> {
        self.record(EngineCall::Resolve(version.download_path().to_owned()));
        match &self.behaviour().resolve_failure {
            Some(message) => Err(failure(message)),
            None => Ok(Distribution::new("/fake/bin")),
        }
    }

    fn prepare(
        &self,
        _distribution: &Distribution,
        run: &RunConfiguration,
        runtime: &RuntimeSettings,
    ) -> Result<Box<dyn Launchable>, EngineError> {
        let args = runtime
            .post_processor
            .process(run.arguments(Path::new("/fake/data")));
        Ok(Box::new(FakeLaunchable {
            port: run.net.port,
            args,
            failure: self.behaviour().start_failure.clone(),
            calls: Arc::clone(&self.calls),
        }))
    }

    fn import_bulk(
        &self,
        _distribution: &Distribution,
        spec: &ImportSpec,
    ) -> Result<Box<dyn ImportProcess>, EngineError> {
        self.record(EngineCall::ImportLaunched(spec.file.clone()));
        let code = self
            .behaviour()
            .import_codes
            .get(&spec.file)
            .copied()
            .unwrap_or(0);
        Ok(Box::new(ScriptedImport {
            file: spec.file.clone(),
            code,
            calls: Arc::clone(&self.calls),
        }))
    }

    fn admin(
        &self,
        _distribution: &Distribution,
        _net: &Net,
        database: &str,
    ) -> Result<Box<dyn AdminSession>, EngineError> {
        self.record(EngineCall::Admin(database.to_owned()));
        let behaviour = self.behaviour();
        Ok(Box::new(FakeSession {
            database: database.to_owned(),
            rejected_commands: behaviour.rejected_commands.clone(),
            failing_script: behaviour.failing_script.clone(),
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct FakeLaunchable {
    port: u16,
    args: Vec<String>,
    failure: Option<String>,
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl Launchable for FakeLaunchable {
    fn start(self: Box<Self>) -> Result<Box<dyn ProcessHandle>, EngineError> {
        record(
            &self.calls,
            EngineCall::Start {
                port: self.port,
                args: self.args.clone(),
            },
        );
        if let Some(message) = &self.failure {
            return Err(failure(message));
        }
        Ok(Box::new(FakeHandle {
            port: self.port,
            calls: self.calls,
        }))
    }
}

#[derive(Debug)]
struct FakeHandle {
    port: u16,
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl ProcessHandle for FakeHandle {
    fn pid(&self) -> u32 {
        FAKE_PID
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        record(&self.calls, EngineCall::Stop(FAKE_PID));
        Ok(())
    }

    fn detach(self: Box<Self>) -> DetachedProcess {
        DetachedProcess {
            pid: FAKE_PID,
            port: self.port,
            program: None,
            executable: None,
            ephemeral_data_dir: None,
        }
    }
}

struct ScriptedImport {
    file: PathBuf,
    code: i32,
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl ImportProcess for ScriptedImport {
    fn file(&self) -> &Path {
        &self.file
    }

    fn wait(&mut self) -> Result<i32, EngineError> {
        record(&self.calls, EngineCall::ImportJoined(self.file.clone()));
        Ok(self.code)
    }

    fn kill(&mut self) -> Result<(), EngineError> {
        record(&self.calls, EngineCall::ImportKilled(self.file.clone()));
        Ok(())
    }
}

struct FakeSession {
    database: String,
    rejected_commands: Option<String>,
    failing_script: Option<(String, String)>,
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl AdminSession for FakeSession {
    fn run_command(&self, command: &Value) -> Result<CommandResult, EngineError> {
        record(
            &self.calls,
            EngineCall::Command {
                database: self.database.clone(),
                command: command.clone(),
            },
        );
        Ok(self
            .rejected_commands
            .as_deref()
            .map_or_else(CommandResult::success, CommandResult::failure))
    }

    fn eval(&self, script: &str) -> Result<CommandResult, EngineError> {
        record(
            &self.calls,
            EngineCall::Eval {
                database: self.database.clone(),
                script: script.to_owned(),
            },
        );
        Ok(match &self.failing_script {
            Some((marker, message)) if script.contains(marker.as_str()) => {
                CommandResult::failure(message)
            }
            _ => CommandResult::success(),
        })
    }
}
