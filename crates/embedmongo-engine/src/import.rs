//! Bulk imports through the distribution's `mongoimport`.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::EngineError;
use crate::launch::Net;

const IMPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::import");
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One import into a running engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Where the engine listens.
    pub net: Net,
    /// Target database.
    pub database: String,
    /// Target collection.
    pub collection: String,
    /// Source file.
    pub file: PathBuf,
    /// Whether the file holds a single JSON array.
    pub json_array: bool,
    /// Drop the collection first.
    pub drop: bool,
    /// Upsert instead of insert.
    pub upsert: bool,
    /// Time allowed before the import is killed.
    pub timeout: Duration,
}

impl ImportSpec {
    /// `mongoimport` arguments for this import.
    #[must_use]
    pub fn arguments(&self) -> Vec<String> {
        let address = self.net.connect_address();
        let mut args = vec![
            "--host".to_owned(),
            address.ip().to_string(),
            "--port".to_owned(),
            address.port().to_string(),
            "--db".to_owned(),
            self.database.clone(),
            "--collection".to_owned(),
            self.collection.clone(),
            "--file".to_owned(),
            self.file.display().to_string(),
        ];
        if address.is_ipv6() {
            args.push("--ipv6".to_owned());
        }
        if self.json_array {
            args.push("--jsonArray".to_owned());
        }
        if self.drop {
            args.push("--drop".to_owned());
        }
        if self.upsert {
            args.push("--upsert".to_owned());
        }
        args
    }
}

/// A launched import that can be joined.
pub trait ImportProcess: Send {
    /// Source file being imported.
    fn file(&self) -> &Path;

    /// Blocks until the import exits and returns its exit code.
    ///
    /// # Errors
    ///
    /// Returns an error when waiting fails or the timeout expires.
    fn wait(&mut self) -> Result<i32, EngineError>;

    /// Kills the import if it is still running and reaps it.
    ///
    /// # Errors
    ///
    /// Returns an error when the process cannot be signalled or reaped.
    fn kill(&mut self) -> Result<(), EngineError>;
}

/// A running `mongoimport` child.
#[derive(Debug)]
pub struct MongoImportProcess {
    child: Child,
    file: PathBuf,
    timeout: Duration,
    started: Instant,
}

impl MongoImportProcess {
    /// Spawns `mongoimport` for `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Spawn`] when the process cannot start.
    pub fn spawn(executable: &Path, spec: &ImportSpec) -> Result<Self, EngineError> {
        let args = spec.arguments();
        debug!(
            target: IMPORT_TARGET,
            file = %spec.file.display(),
            ?args,
            "spawning mongoimport"
        );
        let child = Command::new(executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|error| EngineError::Spawn {
                program: executable.to_path_buf(),
                source: Arc::new(error),
            })?;
        Ok(Self::from_child(child, spec.file.clone(), spec.timeout))
    }

    /// Wraps an already spawned child.
    #[must_use]
    pub fn from_child(child: Child, file: PathBuf, timeout: Duration) -> Self {
        Self {
            child,
            file,
            timeout,
            started: Instant::now(),
        }
    }
}

impl ImportProcess for MongoImportProcess {
    fn file(&self) -> &Path {
        &self.file
    }

    fn wait(&mut self) -> Result<i32, EngineError> {
        let pid = self.child.id();
        let io_error = |source: std::io::Error| EngineError::Stop {
            pid,
            source: Arc::new(source),
        };
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(target: IMPORT_TARGET, file = %self.file.display(), ?status, "mongoimport exited");
                    return Ok(status.code().unwrap_or(-1));
                }
                Ok(None) => {
                    if self.started.elapsed() > self.timeout {
                        warn!(
                            target: IMPORT_TARGET,
                            file = %self.file.display(),
                            timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                            "import timed out, killing process"
                        );
                        drop(self.child.kill());
                        drop(self.child.wait());
                        return Err(EngineError::ImportTimeout {
                            file: self.file.clone(),
                            timeout: self.timeout,
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(error) => return Err(io_error(error)),
            }
        }
    }

    fn kill(&mut self) -> Result<(), EngineError> {
        let pid = self.child.id();
        let io_error = |source: std::io::Error| EngineError::Stop {
            pid,
            source: Arc::new(source),
        };
        if self.child.try_wait().map_err(io_error)?.is_none() {
            debug!(target: IMPORT_TARGET, file = %self.file.display(), pid, "killing mongoimport");
            self.child.kill().map_err(io_error)?;
        }
        self.child.wait().map_err(io_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn spec() -> ImportSpec {
        ImportSpec {
            net: Net {
                bind_ip: None,
                port: 27017,
                ipv6: false,
            },
            database: "app".to_owned(),
            collection: "people".to_owned(),
            file: PathBuf::from("people.json"),
            json_array: true,
            drop: true,
            upsert: false,
            timeout: Duration::from_secs(1),
        }
    }

    #[rstest]
    fn arguments_carry_flags(spec: ImportSpec) {
        let args = spec.arguments();
        assert!(args.contains(&"--jsonArray".to_owned()));
        assert!(args.contains(&"--drop".to_owned()));
        assert!(!args.contains(&"--upsert".to_owned()));
        assert!(args.windows(2).any(|pair| pair == ["--db", "app"]));
        assert!(args.windows(2).any(|pair| pair == ["--collection", "people"]));
    }

    #[cfg(unix)]
    #[rstest]
    fn exit_code_is_returned() {
        let child = Command::new("sh").args(["-c", "exit 3"]).spawn().expect("sh");
        let mut process =
            MongoImportProcess::from_child(child, PathBuf::from("a.json"), Duration::from_secs(5));

        assert_eq!(process.wait().expect("wait should succeed"), 3);
    }

    #[cfg(unix)]
    #[rstest]
    fn timeout_kills_import() {
        let child = Command::new("sleep").arg("30").spawn().expect("sleep");
        let mut process =
            MongoImportProcess::from_child(child, PathBuf::from("b.json"), Duration::from_millis(100));

        let error = process.wait().expect_err("import should time out");

        assert!(matches!(error, EngineError::ImportTimeout { ref file, .. } if file == Path::new("b.json")));
    }

    #[cfg(target_os = "linux")]
    #[rstest]
    fn kill_reaps_running_import() {
        let child = Command::new("sleep").arg("30").spawn().expect("sleep");
        let pid = child.id();
        let mut process =
            MongoImportProcess::from_child(child, PathBuf::from("c.json"), Duration::from_secs(60));

        process.kill().expect("kill should succeed");

        assert!(!Path::new(&format!("/proc/{pid}")).exists());
    }
}
