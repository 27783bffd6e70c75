//! Start and stop entry points.

use std::sync::Arc;

use embedmongo_config::Config;
use embedmongo_engine::{
    Engine, NetworkEnvironment, ProcessHandle, SystemEngine, SystemNetworkEnvironment,
};
use tracing::{info, warn};

use crate::builder::build_plan;
use crate::errors::OrchestratorError;
use crate::handoff::{HANDOFF_KEY, HandoffSlot, Rejected};
use crate::network::configure_network;
use crate::pipeline::{PipelineTarget, PostStartPipeline};
use crate::port::{EphemeralPortAllocator, PortAllocator};
use crate::reporter::{OrchestrationReporter, StructuredReporter};
use crate::supervisor::{RunningEngine, ShutdownSignal, Supervisor, SystemShutdownSignal};

const ORCHESTRATOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::orchestrator");

/// Result of [`Orchestrator::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The engine is running and its handle was published.
    Started {
        /// Port the engine listens on.
        port: u16,
        /// Engine process identifier.
        pid: u32,
    },
    /// Start was skipped by configuration.
    Skipped,
}

/// Result of [`Orchestrator::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The published engine was stopped.
    Stopped {
        /// Engine process identifier.
        pid: u32,
    },
    /// Stop was skipped by configuration.
    Skipped,
}

/// Provisions a throwaway engine and tears it down again.
pub struct Orchestrator {
    engine: Arc<dyn Engine>,
    network: Arc<dyn NetworkEnvironment>,
    ports: Arc<dyn PortAllocator>,
    reporter: Arc<dyn OrchestrationReporter>,
    shutdown: Arc<dyn ShutdownSignal>,
}

impl Orchestrator {
    /// Creates an orchestrator from explicit collaborators.
    #[must_use]
    pub fn new(
        engine: Arc<dyn Engine>,
        network: Arc<dyn NetworkEnvironment>,
        ports: Arc<dyn PortAllocator>,
        reporter: Arc<dyn OrchestrationReporter>,
        shutdown: Arc<dyn ShutdownSignal>,
    ) -> Self {
        Self {
            engine,
            network,
            ports,
            reporter,
            shutdown,
        }
    }

    /// Creates an orchestrator backed by the real engine, network and signals.
    #[must_use]
    pub fn system() -> Self {
        let network: Arc<dyn NetworkEnvironment> = Arc::new(SystemNetworkEnvironment);
        Self::new(
            Arc::new(SystemEngine::new(Arc::clone(&network))),
            network,
            Arc::new(EphemeralPortAllocator),
            Arc::new(StructuredReporter),
            Arc::new(SystemShutdownSignal),
        )
    }

    /// Starts the engine, runs the post-start pipeline and publishes the
    /// handle to `slot`.
    ///
    /// When a pipeline stage fails the engine is stopped before the error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] naming the failing setting, file or
    /// version.
    pub fn start(
        &self,
        config: &Config,
        slot: &dyn HandoffSlot,
    ) -> Result<StartOutcome, OrchestratorError> {
        if config.skip {
            info!(target: ORCHESTRATOR_TARGET, "skipping start");
            return Ok(StartOutcome::Skipped);
        }
        let result = self.try_start(config, slot);
        if let Err(error) = &result {
            self.reporter.start_failed(error);
        }
        result
    }

    fn try_start(
        &self,
        config: &Config,
        slot: &dyn HandoffSlot,
    ) -> Result<StartOutcome, OrchestratorError> {
        let pipeline = PostStartPipeline::from_config(config)?;
        let plan = build_plan(config, self.ports.as_ref(), self.reporter.as_ref())?;
        configure_network(&plan.runtime.artifacts, self.network.as_ref())?;
        slot.ensure_vacant(HANDOFF_KEY)?;

        let mut supervisor = Supervisor::new(self.engine.as_ref(), self.reporter.as_ref());
        let RunningEngine {
            handle,
            distribution,
        } = supervisor.launch(&plan)?;

        let target = PipelineTarget {
            engine: self.engine.as_ref(),
            distribution: &distribution,
            net: &plan.run.net,
            reporter: self.reporter.as_ref(),
        };
        let ready = pipeline.run(&target).and_then(|()| {
            if config.wait {
                supervisor.await_indefinitely(self.shutdown.as_ref())?;
            }
            Ok(())
        });
        if let Err(error) = ready {
            return Err(abandon(&mut supervisor, handle, error));
        }

        let outcome = StartOutcome::Started {
            port: handle.port(),
            pid: handle.pid(),
        };
        if let Err(Rejected { error, handle }) = slot.publish(HANDOFF_KEY, handle) {
            return Err(abandon(&mut supervisor, handle, error.into()));
        }
        Ok(outcome)
    }

    /// Stops the engine published by an earlier [`Orchestrator::start`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::ProcessError::MissingHandle`] when nothing was
    /// published, or [`crate::ProcessError::Stop`] when termination fails.
    pub fn stop(
        &self,
        config: &Config,
        slot: &dyn HandoffSlot,
    ) -> Result<StopOutcome, OrchestratorError> {
        if config.skip {
            info!(target: ORCHESTRATOR_TARGET, "skipping stop");
            return Ok(StopOutcome::Skipped);
        }
        let handle = slot.take(HANDOFF_KEY)?;
        let pid = handle.pid();
        Supervisor::new(self.engine.as_ref(), self.reporter.as_ref()).stop(handle)?;
        Ok(StopOutcome::Stopped { pid })
    }
}

/// Stops an engine that will not be handed off and returns the start error.
fn abandon(
    supervisor: &mut Supervisor<'_>,
    handle: Box<dyn ProcessHandle>,
    error: OrchestratorError,
) -> OrchestratorError {
    warn!(target: ORCHESTRATOR_TARGET, %error, "start aborted after launch, stopping mongod");
    if let Err(stop_error) = supervisor.stop(handle) {
        warn!(target: ORCHESTRATOR_TARGET, error = %stop_error, "failed to stop mongod");
    }
    error
}
