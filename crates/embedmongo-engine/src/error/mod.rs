//! Errors raised by the engine capability.
//!
//! I/O errors are wrapped in `Arc` so the enum stays cheap to move and clone
//! into higher-level error types.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors arising from engine resolution, launch, import and shell use.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No distribution is published for the running platform.
    #[error("no engine distribution for platform {os}/{arch}")]
    UnsupportedPlatform {
        /// Operating system name.
        os: &'static str,
        /// CPU architecture name.
        arch: &'static str,
    },

    /// The download location could not be turned into a URL.
    #[error("invalid download location '{location}': {source}")]
    InvalidUrl {
        /// Location as configured.
        location: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },

    /// The HTTP client could not be built.
    #[error("failed to configure HTTP client: {0}")]
    HttpClient(#[source] Arc<reqwest::Error>),

    /// Fetching an archive failed.
    #[error("failed to download '{url}': {source}")]
    Download {
        /// URL that was requested.
        url: String,
        /// Transport or status failure.
        #[source]
        source: Arc<reqwest::Error>,
    },

    /// Unpacking an archive failed.
    #[error("failed to extract '{archive}': {source}")]
    Extract {
        /// Archive on disk.
        archive: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The unpacked distribution lacks an expected executable.
    #[error("executable '{name}' not found under '{bin_dir}'")]
    MissingExecutable {
        /// Executable name.
        name: String,
        /// Directory that was searched.
        bin_dir: PathBuf,
    },

    /// A filesystem operation failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// Path being operated on.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A child process could not be spawned.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// Program that was executed.
        program: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The engine exited before it accepted connections.
    #[error("mongod exited before accepting connections on port {port}: {status}")]
    ExitedEarly {
        /// Port that was polled.
        port: u16,
        /// Exit status description.
        status: String,
    },

    /// The engine did not accept connections in time.
    #[error("mongod did not accept connections on port {port} within {timeout:?}")]
    StartupTimeout {
        /// Port that was polled.
        port: u16,
        /// Time allowed.
        timeout: Duration,
    },

    /// Signalling or waiting on a process failed.
    #[error("failed to stop process {pid}: {source}")]
    Stop {
        /// Process identifier.
        pid: u32,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A process ignored termination requests.
    #[error("process {pid} did not exit within {timeout:?}")]
    ShutdownTimeout {
        /// Process identifier.
        pid: u32,
        /// Time allowed.
        timeout: Duration,
    },

    /// An import did not finish in time and was killed.
    #[error("import of '{file}' did not finish within {timeout:?}")]
    ImportTimeout {
        /// Source file of the import.
        file: PathBuf,
        /// Time allowed.
        timeout: Duration,
    },

    /// The administrative shell reported a failure.
    #[error("shell exited with {status}: {output}")]
    Shell {
        /// Exit status description.
        status: String,
        /// Captured output.
        output: String,
    },

    /// The administrative shell printed something that is not a command
    /// result.
    #[error("unexpected shell output '{output}': {source}")]
    ShellOutput {
        /// Captured output.
        output: String,
        /// JSON parse failure.
        #[source]
        source: Arc<serde_json::Error>,
    },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}
