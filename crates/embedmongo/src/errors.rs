//! Error types surfaced by the orchestrator.
//!
//! Each failure names the configured entity that caused it: a file, a job, a
//! version string or a hand-off key.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use embedmongo_config::ConfigError;
use embedmongo_engine::EngineError;
use thiserror::Error;

use crate::port::PortError;
use crate::supervisor::ShutdownError;
use crate::telemetry::TelemetryError;

/// Invalid or incomplete settings, detected before any process starts.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Configuration layers could not be loaded.
    #[error(transparent)]
    Load(#[from] ConfigError),

    /// A feature name is not part of the closed feature set.
    #[error("unknown feature '{name}'")]
    UnknownFeature {
        /// Name as configured.
        name: String,
    },

    /// The logging style is not one of console, file or none.
    #[error("unexpected logging style '{name}'; expected console, file or none")]
    UnknownOutputStyle {
        /// Name as configured.
        name: String,
    },

    /// The executable naming policy is not uuid or user.
    #[error("unexpected executable naming '{name}'; expected uuid or user")]
    UnknownNamingPolicy {
        /// Name as configured.
        name: String,
    },

    /// The file logging style needs a log file.
    #[error("no log file given for the file logging style")]
    MissingLogFile,

    /// The file logging style needs an encoding.
    #[error("no encoding given for the file logging style")]
    MissingLogEncoding,

    /// Engine output is written verbatim, so only UTF-8 compatible encodings
    /// can be honoured.
    #[error("unsupported log file encoding '{encoding}'")]
    UnsupportedEncoding {
        /// Encoding as configured.
        encoding: String,
    },

    /// The download location is not a URL.
    #[error("invalid download path '{location}': {source}")]
    InvalidDownloadPath {
        /// Location as configured.
        location: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },

    /// The download location has no host for proxy routing.
    #[error("download path '{location}' has no host")]
    DownloadPathWithoutHost {
        /// Location as configured.
        location: String,
    },

    /// Host loopback detection failed.
    #[error("unable to determine if localhost is IPv6: {source}")]
    HostDetection {
        /// Underlying resolver error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The database directory could not be resolved against the working
    /// directory.
    #[error("unable to resolve database directory '{path}': {source}")]
    DatabaseDirectory {
        /// Directory as configured.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Arc<io::Error>,
    },

    /// An import job has no file.
    #[error("import job {index}: import file is required")]
    MissingImportFile {
        /// Zero-based position of the job.
        index: usize,
    },

    /// An import job has no database and there is no default.
    #[error(
        "import job {index} ('{file}'): a database is required; set `database` on the job or `default_import_database`"
    )]
    MissingImportDatabase {
        /// Zero-based position of the job.
        index: usize,
        /// File of the job.
        file: String,
    },

    /// An import job has no collection.
    #[error("import job {index} ('{file}'): collection is required")]
    MissingImportCollection {
        /// Zero-based position of the job.
        index: usize,
        /// File of the job.
        file: String,
    },
}

/// Failures starting or stopping the engine process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The engine process could not be started.
    #[error("unable to start mongod {version}: {source}")]
    Start {
        /// Version being launched.
        version: String,
        /// Engine failure.
        #[source]
        source: EngineError,
    },

    /// The engine process could not be stopped.
    #[error("unable to stop mongod (pid {pid}): {source}")]
    Stop {
        /// Process identifier.
        pid: u32,
        /// Engine failure.
        #[source]
        source: EngineError,
    },

    /// Stop was requested but nothing was handed off.
    #[error("no mongod process found under '{key}'; was start called?")]
    MissingHandle {
        /// Hand-off key that was empty.
        key: String,
    },

    /// A live process already occupies the hand-off slot.
    #[error("hand-off slot '{key}' already holds running process {pid}")]
    SlotOccupied {
        /// Hand-off key.
        key: String,
        /// Process already recorded.
        pid: u32,
    },

    /// The hand-off record could not be read or written.
    #[error("hand-off record '{path}' is unusable: {message}")]
    Slot {
        /// Record location.
        path: PathBuf,
        /// Failure description.
        message: String,
    },

    /// Waiting for an interrupt failed.
    #[error(transparent)]
    Wait(#[from] ShutdownError),
}

/// Failures running bulk imports.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The import process could not be launched or joined.
    #[error("cannot import '{file}': {source}")]
    Engine {
        /// Source file.
        file: String,
        /// Engine failure.
        #[source]
        source: EngineError,
    },

    /// The import process exited unsuccessfully.
    #[error("Cannot import '{file}' (exit code {code})")]
    Failed {
        /// Source file.
        file: String,
        /// Process exit code.
        code: i32,
    },
}

/// Failures running initialization scripts.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// An initialization job names no database.
    #[error("Database name is missing (initialization {index})")]
    MissingDatabase {
        /// Zero-based position of the job.
        index: usize,
    },

    /// The administrative session could not be opened.
    #[error("unable to connect to database '{database}': {source}")]
    Connect {
        /// Target database.
        database: String,
        /// Engine failure.
        #[source]
        source: EngineError,
    },

    /// A script or script directory could not be read.
    #[error("Unable to find file with name '{file}': {source}")]
    Read {
        /// Script path.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The script could not be delivered to the server.
    #[error("Unable to execute file with name '{file}': {source}")]
    Submit {
        /// Script file name.
        file: String,
        /// Engine failure.
        #[source]
        source: EngineError,
    },

    /// The server rejected the script.
    #[error("Error while executing instructions from file '{file}': {message}")]
    Evaluation {
        /// Script file name.
        file: String,
        /// Server-reported message.
        message: String,
    },
}

/// Top-level orchestration failure.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Settings are invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// No free port could be found.
    #[error(transparent)]
    Port(#[from] PortError),

    /// The distribution could not be obtained.
    #[error("failed to obtain MongoDB distribution {version}: {source}")]
    Artifact {
        /// Version being resolved.
        version: String,
        /// Engine failure naming the download source or archive.
        #[source]
        source: EngineError,
    },

    /// The engine process could not be started or stopped.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// Replica set initiation failed.
    #[error("replica set initiation failed: {message}")]
    ReplicaSet {
        /// Failure description.
        message: String,
        /// Engine failure, when the command could not be delivered.
        #[source]
        source: Option<EngineError>,
    },

    /// A bulk import failed.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// An initialization script failed.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Diagnostics could not be configured.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}
