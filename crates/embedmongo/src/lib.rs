//! Build-time orchestrator for a throwaway MongoDB engine.
//!
//! `start` resolves and launches `mongod`, runs the post-start pipeline
//! (replica set initiation, bulk imports, initialization scripts) and hands
//! the running process to a later `stop` through a [`HandoffSlot`].
//!
//! The runtime is usable from the binary entrypoint and from tests, where
//! the engine, network, port source and hand-off slot can be substituted.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use embedmongo_config::Config;

pub mod builder;
mod cli;
pub mod errors;
pub mod handoff;
pub mod network;
pub mod orchestrator;
pub mod pipeline;
pub mod port;
pub mod reporter;
pub mod supervisor;
pub mod telemetry;
pub mod version;

pub use builder::{EnableAuth, LaunchPlan, build_plan};
pub use cli::{CliError, PORT_PROPERTY};
pub use errors::{ConfigurationError, ImportError, OrchestratorError, ProcessError, ScriptError};
pub use handoff::{HANDOFF_KEY, HandoffSlot, InMemoryHandoff, PidFileHandoff, Rejected};
pub use network::configure_network;
pub use orchestrator::{Orchestrator, StartOutcome, StopOutcome};
pub use pipeline::{ImportTask, PostStartPipeline, plan_imports, replset_command};
pub use port::{EphemeralPortAllocator, PortAllocator, PortError};
pub use reporter::{OrchestrationReporter, StructuredReporter};
pub use supervisor::{
    RunningEngine, ShutdownError, ShutdownSignal, Supervisor, SupervisorState,
    SystemShutdownSignal,
};
pub use telemetry::TelemetryError;
pub use version::resolve_version;

/// Runs the CLI against the real engine, recording hand-offs under the
/// configured runtime directory.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with(args, stdout, stderr, &Orchestrator::system(), |config| {
        Arc::new(PidFileHandoff::new(config.runtime_dir().into_std_path_buf()))
    })
}

/// Runs the CLI with a substituted orchestrator and hand-off slot.
#[must_use]
pub(crate) fn run_with<I, W, E, S>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    orchestrator: &Orchestrator,
    slot_for: S,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    S: FnOnce(&Config) -> Arc<dyn HandoffSlot>,
{
    let cli = match cli::Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let rendered = error.render();
            let written = if error.use_stderr() {
                write!(stderr, "{rendered}")
            } else {
                write!(stdout, "{rendered}")
            };
            drop(written);
            return ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(1));
        }
    };

    let result = cli::load_config(&cli).and_then(|config| {
        telemetry::initialise(&config).map_err(OrchestratorError::from)?;
        let slot = slot_for(&config);
        cli::execute(cli.command, &config, orchestrator, slot.as_ref(), stdout)
    });
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            drop(writeln!(stderr, "embedmongo: {error}"));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests;
