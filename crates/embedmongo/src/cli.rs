//! Command-line surface: argument parsing and command execution.

use std::fs;
use std::io::{self, Write};

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use embedmongo_config::{Config, ConfigOverrides, ConfigSources};
use thiserror::Error;

use crate::errors::{ConfigurationError, OrchestratorError};
use crate::handoff::HandoffSlot;
use crate::orchestrator::{Orchestrator, StartOutcome, StopOutcome};

/// Property name the chosen port is published under.
pub const PORT_PROPERTY: &str = "mongodb.port";

/// Command-line interface for the embedmongo orchestrator.
#[derive(Parser, Debug)]
#[command(name = "embedmongo", disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Configuration file to load instead of `./embedmongo.toml`.
    #[arg(long, value_name = "PATH")]
    pub(crate) config_path: Option<Utf8PathBuf>,
    /// Port the engine listens on.
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Pick a free port.
    #[arg(long)]
    pub(crate) random_port: bool,
    /// Engine version, such as `3.0.2`.
    #[arg(long = "version", value_name = "VERSION")]
    pub(crate) engine_version: Option<String>,
    /// Block after start until interrupted.
    #[arg(long)]
    pub(crate) wait: bool,
    /// Do nothing.
    #[arg(long)]
    pub(crate) skip: bool,
    /// Filter for diagnostics, such as `embedmongo=debug`.
    #[arg(long, value_name = "FILTER")]
    pub(crate) log_filter: Option<String>,
    /// Directory holding the hand-off record.
    #[arg(long, value_name = "DIR")]
    pub(crate) runtime_dir: Option<Utf8PathBuf>,
    /// Lifecycle action.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Lifecycle actions.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Starts the engine and records it for a later stop.
    Start,
    /// Stops the engine recorded by start.
    Stop,
}

impl Cli {
    /// Configuration sources described by the parsed flags.
    pub(crate) fn sources(&self) -> ConfigSources {
        ConfigSources {
            config_path: self.config_path.clone(),
            overrides: ConfigOverrides {
                port: self.port,
                random_port: self.random_port.then_some(true),
                version: self.engine_version.clone(),
                wait: self.wait.then_some(true),
                skip: self.skip.then_some(true),
                log_filter: self.log_filter.clone(),
                runtime_dir: self.runtime_dir.clone(),
            },
        }
    }
}

/// Failures reported by the command-line runner.
#[derive(Debug, Error)]
pub enum CliError {
    /// Orchestration failed.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    /// The port file could not be written.
    #[error("failed to write port file '{path}': {source}")]
    PortFile {
        /// Port file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Standard output could not be written.
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

impl From<ConfigurationError> for CliError {
    fn from(error: ConfigurationError) -> Self {
        Self::Orchestrator(error.into())
    }
}

/// Loads configuration for `cli`.
pub(crate) fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Config::load(&cli.sources()).map_err(|error| CliError::from(ConfigurationError::from(error)))
}

/// Executes `command` and writes its user-facing output to `stdout`.
pub(crate) fn execute<W: Write>(
    command: CliCommand,
    config: &Config,
    orchestrator: &Orchestrator,
    slot: &dyn HandoffSlot,
    stdout: &mut W,
) -> Result<(), CliError> {
    match command {
        CliCommand::Start => match orchestrator.start(config, slot)? {
            StartOutcome::Started { port, .. } => publish_port(config, port, stdout),
            StartOutcome::Skipped => Ok(()),
        },
        CliCommand::Stop => match orchestrator.stop(config, slot)? {
            StopOutcome::Stopped { .. } | StopOutcome::Skipped => Ok(()),
        },
    }
}

fn publish_port<W: Write>(config: &Config, port: u16, stdout: &mut W) -> Result<(), CliError> {
    let line = format!("{PORT_PROPERTY}={port}");
    writeln!(stdout, "{line}").map_err(CliError::Output)?;
    if let Some(path) = &config.port_file {
        let port_file_error = |source| CliError::PortFile {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            fs::create_dir_all(parent).map_err(port_file_error)?;
        }
        fs::write(path, format!("{line}\n")).map_err(port_file_error)?;
    }
    Ok(())
}
