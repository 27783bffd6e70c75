//! Lifecycle of the engine process.
//!
//! The supervisor moves through `Unstarted -> Launching -> Running ->
//! Stopped`, with `Failed` reachable from `Launching`. Artifact resolution
//! failures and start failures are reported as distinct errors.

mod shutdown;

use embedmongo_engine::{Distribution, Engine, ProcessHandle};
use tracing::{debug, info};

use crate::builder::LaunchPlan;
use crate::errors::{OrchestratorError, ProcessError};
use crate::reporter::OrchestrationReporter;

pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const SUPERVISOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Observable supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Nothing has been attempted.
    Unstarted,
    /// The distribution is being resolved or the process started.
    Launching,
    /// The engine accepts connections.
    Running,
    /// The engine was stopped.
    Stopped,
    /// Launching failed.
    Failed,
}

/// A launched engine together with the distribution it came from.
#[derive(Debug)]
pub struct RunningEngine {
    /// Handle to the engine process.
    pub handle: Box<dyn ProcessHandle>,
    /// Distribution whose tools serve the post-start pipeline.
    pub distribution: Distribution,
}

/// Drives one engine process through its lifecycle.
pub struct Supervisor<'a> {
    engine: &'a dyn Engine,
    reporter: &'a dyn OrchestrationReporter,
    state: SupervisorState,
}

impl<'a> Supervisor<'a> {
    /// Creates an unstarted supervisor.
    #[must_use]
    pub fn new(engine: &'a dyn Engine, reporter: &'a dyn OrchestrationReporter) -> Self {
        Self {
            engine,
            reporter,
            state: SupervisorState::Unstarted,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SupervisorState {
        self.state
    }

    /// Resolves the distribution and starts the engine.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Artifact`] when the distribution cannot
    /// be obtained and [`ProcessError::Start`] when the process fails to
    /// start. Both leave the supervisor in [`SupervisorState::Failed`].
    pub fn launch(&mut self, plan: &LaunchPlan) -> Result<RunningEngine, OrchestratorError> {
        self.state = SupervisorState::Launching;
        let result = self.try_launch(plan);
        self.state = if result.is_ok() {
            SupervisorState::Running
        } else {
            SupervisorState::Failed
        };
        result
    }

    fn try_launch(&self, plan: &LaunchPlan) -> Result<RunningEngine, OrchestratorError> {
        let version = &plan.run.version;
        self.reporter.launching(version, plan.port());
        let distribution = self
            .engine
            .resolve(version, &plan.runtime.artifacts)
            .map_err(|source| OrchestratorError::Artifact {
                version: version.to_string(),
                source,
            })?;
        debug!(
            target: SUPERVISOR_TARGET,
            bin_dir = %distribution.bin_dir().display(),
            "distribution resolved"
        );

        let start_error = |source| ProcessError::Start {
            version: version.to_string(),
            source,
        };
        let handle = self
            .engine
            .prepare(&distribution, &plan.run, &plan.runtime)
            .and_then(|launchable| launchable.start())
            .map_err(start_error)?;
        self.reporter.launched(handle.pid(), handle.port());
        Ok(RunningEngine {
            handle,
            distribution,
        })
    }

    /// Blocks until `signal` reports an interrupt.
    ///
    /// The interrupt is a normal way out, not a failure.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Wait`] when the listener cannot be installed.
    pub fn await_indefinitely(&self, signal: &dyn ShutdownSignal) -> Result<(), ProcessError> {
        info!(target: SUPERVISOR_TARGET, "waiting for interrupt");
        signal.wait()?;
        Ok(())
    }

    /// Terminates the engine behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Stop`] when the process cannot be terminated.
    pub fn stop(&mut self, mut handle: Box<dyn ProcessHandle>) -> Result<(), ProcessError> {
        let pid = handle.pid();
        handle
            .stop()
            .map_err(|source| ProcessError::Stop { pid, source })?;
        self.state = SupervisorState::Stopped;
        self.reporter.stopped(pid);
        Ok(())
    }
}
