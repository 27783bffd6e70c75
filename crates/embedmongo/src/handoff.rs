//! Hand-off of the running engine from `start` to a later `stop`.
//!
//! A slot holds at most one handle per key. `start` publishes once and `stop`
//! takes once; taking from an empty slot is a reported failure.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use embedmongo_engine::{DetachedProcess, ProcessHandle};
use tempfile::Builder;
use tracing::{debug, info, warn};

use crate::errors::ProcessError;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const HANDOFF_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::handoff");

/// Well-known key the running engine is published under.
pub const HANDOFF_KEY: &str = "embedmongo.mongod";

/// Keyed store passing a process handle from start to stop.
pub trait HandoffSlot: Send + Sync {
    /// Fails when `key` already holds a live process.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::SlotOccupied`] when the slot is taken.
    fn ensure_vacant(&self, key: &str) -> Result<(), ProcessError>;

    /// Stores `handle` under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejected`] publication holding the handle and either
    /// [`ProcessError::SlotOccupied`] when a live process is already recorded
    /// or [`ProcessError::Slot`] when the record cannot be written.
    fn publish(&self, key: &str, handle: Box<dyn ProcessHandle>) -> Result<(), Rejected>;

    /// Removes and returns the handle stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::MissingHandle`] when nothing was published.
    fn take(&self, key: &str) -> Result<Box<dyn ProcessHandle>, ProcessError>;
}

/// A publication the slot refused; the caller still owns the process.
#[derive(Debug)]
pub struct Rejected {
    /// Why the handle was not stored.
    pub error: ProcessError,
    /// The handle that was offered.
    pub handle: Box<dyn ProcessHandle>,
}

impl Rejected {
    fn new(error: ProcessError, handle: Box<dyn ProcessHandle>) -> Self {
        Self { error, handle }
    }
}

/// Slot living in this process's memory.
#[derive(Debug, Default)]
pub struct InMemoryHandoff {
    handles: Mutex<HashMap<String, Box<dyn ProcessHandle>>>,
}

impl HandoffSlot for InMemoryHandoff {
    fn ensure_vacant(&self, key: &str) -> Result<(), ProcessError> {
        let handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        match handles.get(key) {
            Some(existing) => Err(occupied(key, existing.pid())),
            None => Ok(()),
        }
    }

    fn publish(&self, key: &str, handle: Box<dyn ProcessHandle>) -> Result<(), Rejected> {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = handles.get(key) {
            return Err(Rejected::new(occupied(key, existing.pid()), handle));
        }
        handles.insert(key.to_owned(), handle);
        Ok(())
    }

    fn take(&self, key: &str) -> Result<Box<dyn ProcessHandle>, ProcessError> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .ok_or_else(|| missing(key))
    }
}

/// Slot persisted as a JSON record so a later invocation can stop the engine.
#[derive(Debug, Clone)]
pub struct PidFileHandoff {
    dir: PathBuf,
}

impl PidFileHandoff {
    /// Stores records under `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Location of the record for `key`.
    #[must_use]
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn read(path: &Path) -> Result<Option<DetachedProcess>, ProcessError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(slot_error(path, &error)),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|error| slot_error(path, &error))
    }

    fn write(&self, path: &Path, record: &DetachedProcess) -> Result<(), ProcessError> {
        let contents =
            serde_json::to_vec_pretty(record).map_err(|error| slot_error(path, &error))?;
        fs::create_dir_all(&self.dir).map_err(|error| slot_error(&self.dir, &error))?;
        atomic_write(path, &contents).map_err(|error| slot_error(path, &error))
    }
}

impl HandoffSlot for PidFileHandoff {
    fn ensure_vacant(&self, key: &str) -> Result<(), ProcessError> {
        match Self::read(&self.record_path(key)) {
            Ok(Some(existing)) if existing.is_running() => Err(occupied(key, existing.pid)),
            _ => Ok(()),
        }
    }

    fn publish(&self, key: &str, handle: Box<dyn ProcessHandle>) -> Result<(), Rejected> {
        let path = self.record_path(key);
        match Self::read(&path) {
            Ok(Some(existing)) if existing.is_running() => {
                return Err(Rejected::new(occupied(key, existing.pid), handle));
            }
            Ok(Some(stale)) => {
                warn!(target: HANDOFF_TARGET, pid = stale.pid, path = %path.display(), "replacing stale hand-off record");
            }
            Ok(None) => {}
            Err(error) => {
                warn!(target: HANDOFF_TARGET, %error, "replacing unreadable hand-off record");
            }
        }

        let record = handle.detach();
        if let Err(error) = self.write(&path, &record) {
            return Err(Rejected::new(error, Box::new(record)));
        }
        info!(target: HANDOFF_TARGET, pid = record.pid, path = %path.display(), "hand-off record written");
        Ok(())
    }

    fn take(&self, key: &str) -> Result<Box<dyn ProcessHandle>, ProcessError> {
        let path = self.record_path(key);
        let record = Self::read(&path)?.ok_or_else(|| missing(key))?;
        fs::remove_file(&path).map_err(|error| slot_error(&path, &error))?;
        debug!(target: HANDOFF_TARGET, pid = record.pid, path = %path.display(), "hand-off record taken");
        Ok(Box::new(record))
    }
}

fn missing(key: &str) -> ProcessError {
    ProcessError::MissingHandle {
        key: key.to_owned(),
    }
}

fn occupied(key: &str, pid: u32) -> ProcessError {
    ProcessError::SlotOccupied {
        key: key.to_owned(),
        pid,
    }
}

fn slot_error(path: &Path, error: &dyn std::error::Error) -> ProcessError {
    ProcessError::Slot {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

/// Writes `contents` to a temporary sibling and renames it over `path`.
fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "target path did not have a parent directory",
        )
    })?;

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("embedmongo"),
    );
    #[cfg(unix)]
    {
        builder.permissions(fs::Permissions::from_mode(0o600));
    }

    let mut file = builder.tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}
