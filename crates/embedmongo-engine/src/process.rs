//! Engine process launch, readiness and termination.

use std::env;
use std::fmt;
use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::launch::{CommandLinePostProcessor, RunConfiguration};
use crate::output::OutputSinkConfig;
use crate::signal;

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Time allowed for the engine to accept connections after spawning.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);
const STOP_TIMEOUT: Duration = Duration::from_secs(10);
const KILL_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const CONNECT_TIMEOUT: Duration = Duration::from_millis(250);

/// A running engine process that can be stopped.
pub trait ProcessHandle: Send + fmt::Debug {
    /// Operating system process identifier.
    fn pid(&self) -> u32;

    /// Port the engine listens on.
    fn port(&self) -> u16;

    /// Terminates the process and removes run-scoped files.
    ///
    /// # Errors
    ///
    /// Returns an error when the process cannot be signalled or outlives the
    /// shutdown timeout.
    fn stop(&mut self) -> Result<(), EngineError>;

    /// Releases ownership so another invocation can stop the process later.
    fn detach(self: Box<Self>) -> DetachedProcess;
}

/// A prepared engine process that has not been spawned yet.
pub trait Launchable: Send {
    /// Spawns the process and waits until it accepts connections.
    ///
    /// # Errors
    ///
    /// Returns an error when spawning fails or the process never becomes
    /// reachable.
    fn start(self: Box<Self>) -> Result<Box<dyn ProcessHandle>, EngineError>;
}

/// Launches `mongod` from a staged executable.
#[derive(Debug)]
pub struct MongodLauncher {
    executable: PathBuf,
    remove_executable: bool,
    run: RunConfiguration,
    output: OutputSinkConfig,
    post_processor: Arc<dyn CommandLinePostProcessor>,
    startup_timeout: Duration,
}

impl MongodLauncher {
    /// Creates a launcher for `executable`.
    ///
    /// When `remove_executable` is set the executable is deleted on stop.
    #[must_use]
    pub fn new(
        executable: PathBuf,
        remove_executable: bool,
        run: RunConfiguration,
        output: OutputSinkConfig,
        post_processor: Arc<dyn CommandLinePostProcessor>,
    ) -> Self {
        Self {
            executable,
            remove_executable,
            run,
            output,
            post_processor,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Overrides the readiness timeout.
    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    fn data_dir(&self) -> (PathBuf, Option<PathBuf>) {
        match &self.run.storage.data_dir {
            Some(dir) => (dir.clone(), None),
            None => {
                let dir = env::temp_dir().join(format!("embedmongo-db-{}", Uuid::new_v4().simple()));
                (dir.clone(), Some(dir))
            }
        }
    }
}

impl Launchable for MongodLauncher {
    fn start(self: Box<Self>) -> Result<Box<dyn ProcessHandle>, EngineError> {
        let (data_dir, ephemeral) = self.data_dir();
        fs::create_dir_all(&data_dir).map_err(|error| EngineError::io(&data_dir, error))?;

        let args = self.post_processor.process(self.run.arguments(&data_dir));
        let (stdout, stderr) = self.output.stdio()?;
        let port = self.run.net.port;
        info!(
            target: PROCESS_TARGET,
            executable = %self.executable.display(),
            port,
            version = %self.run.version,
            "starting mongod"
        );
        debug!(target: PROCESS_TARGET, ?args, "mongod arguments");

        let mut child = Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|error| EngineError::Spawn {
                program: self.executable.clone(),
                source: Arc::new(error),
            })?;

        let executable = self.remove_executable.then(|| self.executable.clone());
        if let Err(error) = wait_for_ready(&mut child, self.run.net.connect_address(), self.startup_timeout)
        {
            drop(child.kill());
            drop(child.wait());
            cleanup(executable.as_deref(), ephemeral.as_deref());
            return Err(error);
        }

        info!(target: PROCESS_TARGET, pid = child.id(), port, "mongod accepting connections");
        Ok(Box::new(MongodProcess {
            child,
            port,
            program: self.executable,
            executable,
            ephemeral_data_dir: ephemeral,
            stopped: false,
        }))
    }
}

/// Polls until `address` accepts a TCP connection or the child exits.
pub(crate) fn wait_for_ready(
    child: &mut Child,
    address: SocketAddr,
    timeout: Duration,
) -> Result<(), EngineError> {
    let deadline = Instant::now() + timeout;
    loop {
        let exited = child.try_wait().map_err(|error| EngineError::Stop {
            pid: child.id(),
            source: Arc::new(error),
        })?;
        if let Some(status) = exited {
            return Err(EngineError::ExitedEarly {
                port: address.port(),
                status: status.to_string(),
            });
        }
        if TcpStream::connect_timeout(&address, CONNECT_TIMEOUT).is_ok() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(EngineError::StartupTimeout {
                port: address.port(),
                timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// An engine process spawned by this process.
#[derive(Debug)]
pub struct MongodProcess {
    child: Child,
    port: u16,
    program: PathBuf,
    executable: Option<PathBuf>,
    ephemeral_data_dir: Option<PathBuf>,
    stopped: bool,
}

impl ProcessHandle for MongodProcess {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        if self.stopped {
            return Ok(());
        }
        let pid = self.child.id();
        let stop_error = |source: std::io::Error| EngineError::Stop {
            pid,
            source: Arc::new(source),
        };

        if cfg!(unix) {
            signal::terminate(pid).map_err(stop_error)?;
        } else {
            self.child.kill().map_err(stop_error)?;
        }

        let deadline = Instant::now() + STOP_TIMEOUT;
        loop {
            if self.child.try_wait().map_err(stop_error)?.is_some() {
                break;
            }
            if Instant::now() >= deadline {
                warn!(target: PROCESS_TARGET, pid, "mongod ignored SIGTERM, killing");
                self.child.kill().map_err(stop_error)?;
                self.child.wait().map_err(stop_error)?;
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        self.stopped = true;
        cleanup(self.executable.as_deref(), self.ephemeral_data_dir.as_deref());
        info!(target: PROCESS_TARGET, pid, "mongod stopped");
        Ok(())
    }

    fn detach(self: Box<Self>) -> DetachedProcess {
        let this = *self;
        DetachedProcess {
            pid: this.child.id(),
            port: this.port,
            program: Some(this.program),
            executable: this.executable,
            ephemeral_data_dir: this.ephemeral_data_dir,
        }
    }
}

/// A serialisable reference to an engine process owned by nobody.
///
/// Used to stop a process started by an earlier invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachedProcess {
    /// Operating system process identifier.
    pub pid: u32,
    /// Port the engine listens on.
    pub port: u16,
    /// Executable the process was launched from.
    #[serde(default)]
    pub program: Option<PathBuf>,
    /// Staged executable removed after stopping.
    #[serde(default)]
    pub executable: Option<PathBuf>,
    /// Data directory removed after stopping.
    #[serde(default)]
    pub ephemeral_data_dir: Option<PathBuf>,
}

impl DetachedProcess {
    /// Whether the recorded pid still belongs to the engine it names.
    ///
    /// A live pid only counts when it runs the recorded program or the
    /// recorded port still accepts connections; otherwise the pid has been
    /// reused by an unrelated process.
    #[must_use]
    pub fn is_running(&self) -> bool {
        signal::is_alive(self.pid) && (self.runs_program() || self.port_accepts_connections())
    }

    #[cfg(target_os = "linux")]
    fn runs_program(&self) -> bool {
        let Some(program) = &self.program else {
            return false;
        };
        let Ok(running) = fs::read_link(format!("/proc/{}/exe", self.pid)) else {
            return false;
        };
        fs::canonicalize(program).is_ok_and(|program| program == running)
    }

    #[cfg(not(target_os = "linux"))]
    const fn runs_program(&self) -> bool {
        false
    }

    fn port_accepts_connections(&self) -> bool {
        [
            SocketAddr::from((Ipv4Addr::LOCALHOST, self.port)),
            SocketAddr::from((Ipv6Addr::LOCALHOST, self.port)),
        ]
        .iter()
        .any(|address| TcpStream::connect_timeout(address, CONNECT_TIMEOUT).is_ok())
    }

    fn wait_for_exit(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while signal::is_alive(self.pid) {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }
        true
    }
}

impl ProcessHandle for DetachedProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        let pid = self.pid;
        if !self.is_running() {
            if signal::is_alive(pid) {
                warn!(target: PROCESS_TARGET, pid, port = self.port, "pid now belongs to another process, not signalling");
            } else {
                info!(target: PROCESS_TARGET, pid, "mongod already stopped");
            }
            cleanup(self.executable.as_deref(), self.ephemeral_data_dir.as_deref());
            return Ok(());
        }
        let stop_error = |source: std::io::Error| EngineError::Stop {
            pid,
            source: Arc::new(source),
        };
        signal::terminate(pid).map_err(stop_error)?;
        if !self.wait_for_exit(STOP_TIMEOUT) {
            warn!(target: PROCESS_TARGET, pid, "mongod ignored SIGTERM, killing");
            signal::force_kill(pid).map_err(stop_error)?;
            if !self.wait_for_exit(KILL_TIMEOUT) {
                return Err(EngineError::ShutdownTimeout {
                    pid,
                    timeout: STOP_TIMEOUT + KILL_TIMEOUT,
                });
            }
        }
        cleanup(self.executable.as_deref(), self.ephemeral_data_dir.as_deref());
        info!(target: PROCESS_TARGET, pid, "mongod stopped");
        Ok(())
    }

    fn detach(self: Box<Self>) -> DetachedProcess {
        *self
    }
}

fn cleanup(executable: Option<&Path>, data_dir: Option<&Path>) {
    if let Some(path) = executable
        && let Err(error) = fs::remove_file(path)
        && error.kind() != std::io::ErrorKind::NotFound
    {
        warn!(target: PROCESS_TARGET, path = %path.display(), %error, "failed to remove executable");
    }
    if let Some(path) = data_dir
        && let Err(error) = fs::remove_dir_all(path)
        && error.kind() != std::io::ErrorKind::NotFound
    {
        warn!(target: PROCESS_TARGET, path = %path.display(), %error, "failed to remove data directory");
    }
}
