//! Engine capability backed by real distributions and child processes.

use std::sync::Arc;
use std::time::Duration;

use crate::artifact::{ArtifactRetrievalConfig, ArtifactStore, Distribution, ExecutableNaming};
use crate::error::EngineError;
use crate::import::{ImportProcess, ImportSpec, MongoImportProcess};
use crate::launch::{Net, RunConfiguration};
use crate::network::NetworkEnvironment;
use crate::process::{DEFAULT_STARTUP_TIMEOUT, Launchable, MongodLauncher};
use crate::shell::{AdminSession, ShellAdminSession};
use crate::version::EngineVersion;
use crate::{Engine, RuntimeSettings};

/// Name of the server executable.
pub const MONGOD: &str = "mongod";
/// Name of the bulk import executable.
pub const MONGOIMPORT: &str = "mongoimport";
/// Name of the administrative shell executable.
pub const MONGO_SHELL: &str = "mongo";

/// Engine capability that downloads distributions and spawns processes.
pub struct SystemEngine {
    network: Arc<dyn NetworkEnvironment>,
    startup_timeout: Duration,
}

impl SystemEngine {
    /// Creates an engine that downloads through `network`.
    #[must_use]
    pub fn new(network: Arc<dyn NetworkEnvironment>) -> Self {
        Self {
            network,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    /// Overrides how long launches wait for the engine to accept connections.
    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

impl Engine for SystemEngine {
    fn resolve(
        &self,
        version: &EngineVersion,
        artifacts: &ArtifactRetrievalConfig,
    ) -> Result<Distribution, EngineError> {
        ArtifactStore::new(artifacts, self.network.as_ref()).resolve(version)
    }

    fn prepare(
        &self,
        distribution: &Distribution,
        run: &RunConfiguration,
        runtime: &RuntimeSettings,
    ) -> Result<Box<dyn Launchable>, EngineError> {
        let naming = runtime.artifacts.naming;
        let executable = distribution.stage(MONGOD, naming)?;
        let launcher = MongodLauncher::new(
            executable,
            naming == ExecutableNaming::UniquePerRun,
            run.clone(),
            runtime.output.clone(),
            Arc::clone(&runtime.post_processor),
        )
        .with_startup_timeout(self.startup_timeout);
        Ok(Box::new(launcher))
    }

    fn import_bulk(
        &self,
        distribution: &Distribution,
        spec: &ImportSpec,
    ) -> Result<Box<dyn ImportProcess>, EngineError> {
        let executable = distribution.executable(MONGOIMPORT)?;
        Ok(Box::new(MongoImportProcess::spawn(&executable, spec)?))
    }

    fn admin(
        &self,
        distribution: &Distribution,
        net: &Net,
        database: &str,
    ) -> Result<Box<dyn AdminSession>, EngineError> {
        let shell = distribution.executable(MONGO_SHELL)?;
        Ok(Box::new(ShellAdminSession::new(shell, net.clone(), database)))
    }
}
