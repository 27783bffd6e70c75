//! Destinations for engine output.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use crate::error::EngineError;

/// Where the engine's standard output and error go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSinkConfig {
    /// The orchestrator's console.
    ///
    /// Both streams go to the orchestrator's stderr so that callers capturing
    /// its stdout see end-of-file once it exits, even while the engine runs.
    Console,
    /// Append to a file written in the given encoding.
    File {
        /// Log file path.
        path: PathBuf,
        /// Text encoding label.
        encoding: String,
    },
    /// Drop all output.
    Discard,
}

impl OutputSinkConfig {
    /// Standard output and error handles for a child process.
    ///
    /// # Errors
    ///
    /// Returns an error when the log file cannot be opened.
    pub fn stdio(&self) -> Result<(Stdio, Stdio), EngineError> {
        match self {
            Self::Console => Ok((Stdio::from(io::stderr()), Stdio::inherit())),
            Self::Discard => Ok((Stdio::null(), Stdio::null())),
            Self::File { path, .. } => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|error| EngineError::io(parent, error))?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|error| EngineError::io(path, error))?;
                let errors = file
                    .try_clone()
                    .map_err(|error| EngineError::io(path, error))?;
                Ok((Stdio::from(file), Stdio::from(errors)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::process::Command;

    #[cfg(unix)]
    #[rstest]
    fn file_sink_collects_both_streams() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let path = dir.path().join("logs").join("mongodb.log");
        let sink = OutputSinkConfig::File {
            path: path.clone(),
            encoding: "utf-8".to_owned(),
        };
        let (stdout, stderr) = sink.stdio().expect("log file should open");

        let status = Command::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .expect("shell should run");

        assert!(status.success());
        let contents = fs::read_to_string(&path).expect("log file should exist");
        assert!(contents.contains("out"));
        assert!(contents.contains("err"));
    }

    #[cfg(unix)]
    #[rstest]
    fn console_sink_keeps_stdout_free() {
        let (stdout, stderr) = OutputSinkConfig::Console.stdio().expect("console");

        let output = Command::new("sh")
            .args(["-c", "echo engine-banner"])
            .stdout(stdout)
            .stderr(stderr)
            .output()
            .expect("shell should run");

        assert!(output.status.success());
        assert!(output.stdout.is_empty());
    }

    #[rstest]
    fn discard_and_console_need_no_files() {
        assert!(OutputSinkConfig::Discard.stdio().is_ok());
        assert!(OutputSinkConfig::Console.stdio().is_ok());
    }
}
