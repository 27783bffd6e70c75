//! Engine capability for embedmongo.
//!
//! Resolves MongoDB distributions into a local artifact store, launches
//! `mongod`, runs `mongoimport`, and issues administrative commands through
//! the bundled shell. The orchestrator consumes everything through the
//! [`Engine`] trait so tests can substitute doubles.

pub mod artifact;
pub mod error;
pub mod import;
pub mod launch;
pub mod network;
pub mod output;
pub mod process;
pub mod shell;
mod signal;
pub mod system;
pub mod version;

use std::fmt;
use std::sync::Arc;

pub use artifact::{ArtifactRetrievalConfig, Distribution, ExecutableNaming};
pub use error::EngineError;
pub use import::{ImportProcess, ImportSpec};
pub use launch::{
    AUTH_FLAG, CommandLinePostProcessor, NO_AUTH_FLAG, Net, PassThrough, RunConfiguration,
    Storage, SyncDelay,
};
pub use network::{
    NetworkEnvironment, ProxyCredentials, ProxyRoute, ProxySettings, SystemNetworkEnvironment,
};
pub use output::OutputSinkConfig;
pub use process::{DetachedProcess, Launchable, ProcessHandle};
pub use reqwest::blocking::Client as HttpClient;
pub use shell::{AdminSession, CommandResult};
pub use system::SystemEngine;
pub use version::{EngineVersion, Feature, KnownRelease, VersionDescriptor};

/// Process-level settings that accompany a [`RunConfiguration`].
#[derive(Clone)]
pub struct RuntimeSettings {
    /// Where engine output goes.
    pub output: OutputSinkConfig,
    /// Where distributions come from.
    pub artifacts: ArtifactRetrievalConfig,
    /// Final rewrite of the engine command line.
    pub post_processor: Arc<dyn CommandLinePostProcessor>,
}

impl fmt::Debug for RuntimeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeSettings")
            .field("output", &self.output)
            .field("artifacts", &self.artifacts)
            .field("post_processor", &self.post_processor)
            .finish()
    }
}

/// The database engine as seen by the orchestrator.
pub trait Engine: Send + Sync {
    /// Resolves the distribution for `version`, downloading it when needed.
    ///
    /// # Errors
    ///
    /// Returns an error when the distribution cannot be fetched or unpacked.
    fn resolve(
        &self,
        version: &EngineVersion,
        artifacts: &ArtifactRetrievalConfig,
    ) -> Result<Distribution, EngineError>;

    /// Prepares a process for `run` without starting it.
    ///
    /// # Errors
    ///
    /// Returns an error when the executable cannot be staged.
    fn prepare(
        &self,
        distribution: &Distribution,
        run: &RunConfiguration,
        runtime: &RuntimeSettings,
    ) -> Result<Box<dyn Launchable>, EngineError>;

    /// Launches a bulk import without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns an error when the import process cannot be spawned.
    fn import_bulk(
        &self,
        distribution: &Distribution,
        spec: &ImportSpec,
    ) -> Result<Box<dyn ImportProcess>, EngineError>;

    /// Opens an administrative session against `database`.
    ///
    /// # Errors
    ///
    /// Returns an error when the shell is unavailable.
    fn admin(
        &self,
        distribution: &Distribution,
        net: &Net,
        database: &str,
    ) -> Result<Box<dyn AdminSession>, EngineError>;
}
