use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

/// Port used when random port mode is off and nothing else is configured.
pub const DEFAULT_PORT: u16 = 27017;

/// Base URL that engine distributions are downloaded from.
pub const DEFAULT_DOWNLOAD_PATH: &str = "http://fastdl.mongodb.org/";

/// Style name for engine output when none is configured.
pub const DEFAULT_LOGGING: &str = "console";

/// Log file used by the file output style.
pub const DEFAULT_LOG_FILE: &str = "mongodb.log";

/// Text encoding of the engine log file.
pub const DEFAULT_LOG_FILE_ENCODING: &str = "utf-8";

/// Executable naming policy name when none is configured.
pub const DEFAULT_EXECUTABLE_NAMING: &str = "uuid";

/// Default log filter expression for the orchestrator's own diagnostics.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Per-job import timeout in milliseconds.
pub const DEFAULT_IMPORT_TIMEOUT_MS: u64 = 200_000;

/// Default log filter expression for the orchestrator's own diagnostics.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default import timeout used by serde when a job omits it.
pub const fn default_import_timeout_ms() -> u64 {
    DEFAULT_IMPORT_TIMEOUT_MS
}

pub(crate) const fn default_true() -> bool {
    true
}

/// Computes the directory holding hand-off records between `start` and `stop`.
pub fn default_runtime_dir() -> Utf8PathBuf {
    default_runtime_dir_inner()
}

#[cfg(unix)]
fn default_runtime_dir_inner() -> Utf8PathBuf {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("embedmongo");
    if apply_namespace {
        base.push(user_namespace());
    }
    base
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_runtime_dir_inner() -> Utf8PathBuf {
    fallback_base_directory().join("embedmongo")
}
