//! Post-start initialization.
//!
//! Stages run in the fixed order replica set, imports, scripts. Each stage is
//! optional and a failure aborts the remaining stages.

mod import;
mod replset;
mod scripts;

use embedmongo_config::{Config, InitializationConfig, ReplSetInitiateConfig};
use embedmongo_engine::{Distribution, Engine, Net};
use tracing::debug;

use crate::errors::{ConfigurationError, OrchestratorError};
use crate::reporter::OrchestrationReporter;

pub use import::{ImportTask, plan_imports};
pub use replset::{ADMIN_DATABASE, replset_command};
pub use scripts::wrap_script;

pub(crate) const PIPELINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pipeline");

/// The running instance the stages act on.
pub struct PipelineTarget<'a> {
    /// Engine capability.
    pub engine: &'a dyn Engine,
    /// Distribution providing the import and shell tools.
    pub distribution: &'a Distribution,
    /// Network settings of the running instance, including its port.
    pub net: &'a Net,
    /// Lifecycle observer.
    pub reporter: &'a dyn OrchestrationReporter,
}

/// Validated post-start work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostStartPipeline {
    /// Replica set initiation, run first.
    pub repl_set_initiate: Option<ReplSetInitiateConfig>,
    /// Import tasks, run second.
    pub imports: Vec<ImportTask>,
    /// Launch all imports before joining them.
    pub parallel: bool,
    /// Script initializations, run last.
    pub initializations: Vec<InitializationConfig>,
}

impl PostStartPipeline {
    /// Validates the post-start settings of `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for an invalid import job.
    pub fn from_config(config: &Config) -> Result<Self, ConfigurationError> {
        Ok(Self {
            repl_set_initiate: config.repl_set_initiate.clone(),
            imports: plan_imports(&config.imports, config.default_import_database.as_deref())?,
            parallel: config.parallel,
            initializations: config.initializations.clone(),
        })
    }

    /// Runs every configured stage against `target`.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure.
    pub fn run(&self, target: &PipelineTarget<'_>) -> Result<(), OrchestratorError> {
        if let Some(replset) = &self.repl_set_initiate {
            replset::initiate(target, replset)?;
        }
        if !self.imports.is_empty() {
            debug!(target: PIPELINE_TARGET, count = self.imports.len(), parallel = self.parallel, "running imports");
            import::run_imports(target, &self.imports, self.parallel)?;
        }
        if !self.initializations.is_empty() {
            debug!(target: PIPELINE_TARGET, count = self.initializations.len(), "running initializations");
            scripts::run_initializations(target, &self.initializations)?;
        }
        Ok(())
    }
}
