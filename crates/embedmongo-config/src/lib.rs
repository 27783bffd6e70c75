//! Configuration for the embedmongo orchestrator.
//!
//! Values are layered from built-in defaults, an optional TOML file,
//! `EMBEDMONGO_*` environment variables and finally command-line overrides.

mod defaults;
mod jobs;
mod logging;
mod replset;

use std::collections::BTreeMap;
use std::env;
use std::iter;

use camino::Utf8PathBuf;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_DOWNLOAD_PATH, DEFAULT_EXECUTABLE_NAMING, DEFAULT_IMPORT_TIMEOUT_MS, DEFAULT_LOG_FILE,
    DEFAULT_LOG_FILE_ENCODING, DEFAULT_LOG_FILTER, DEFAULT_LOGGING, DEFAULT_PORT,
    default_import_timeout_ms, default_log_filter, default_runtime_dir,
};
pub use jobs::{ImportJobConfig, InitializationConfig};
pub use logging::{ExecutableNamingPolicy, LogFormat, NameParseError, OutputStyle};
pub use replset::{
    GetLastErrorModeConfig, ReplSetInitiateConfig, ReplSetMemberConfig, ReplSetSettingsConfig,
};

/// Prefix shared by every environment variable the loader reads.
pub const ENV_PREFIX: &str = "EMBEDMONGO_";

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "EMBEDMONGO_CONFIG_PATH";

/// Configuration file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "embedmongo.toml";

/// String keys whose environment values are taken verbatim, so that values
/// such as `12345` or `true` are not parsed into numbers or booleans.
const TEXT_KEYS: &[&str] = &[
    "version",
    "bind_ip",
    "proxy_host",
    "proxy_user",
    "proxy_password",
    "logging",
    "log_file",
    "log_file_encoding",
    "download_path",
    "repl_set",
    "executable_naming",
    "default_import_database",
    "log_filter",
];

/// Complete orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the engine listens on unless `random_port` is set.
    pub port: u16,
    /// Pick a free port instead of `port`.
    pub random_port: bool,
    /// Requested engine version; the current production release when unset.
    pub version: Option<String>,
    /// Optional engine features, matched case-insensitively.
    pub features: Vec<String>,
    /// Absolute data directory; an ephemeral one is used when unset.
    pub database_directory: Option<Utf8PathBuf>,
    /// Address the engine binds to.
    pub bind_ip: Option<String>,
    /// Proxy used for artifact downloads.
    pub proxy_host: Option<String>,
    /// Proxy port.
    pub proxy_port: Option<u16>,
    /// Proxy user name.
    pub proxy_user: Option<String>,
    /// Proxy password.
    pub proxy_password: Option<String>,
    /// Block after start until interrupted.
    pub wait: bool,
    /// Engine output style: `console`, `file` or `none`.
    pub logging: String,
    /// Log file for the `file` style.
    pub log_file: String,
    /// Encoding of the log file.
    pub log_file_encoding: String,
    /// Base URL distributions are downloaded from.
    pub download_path: String,
    /// Start the engine with authentication enabled.
    pub auth_enabled: bool,
    /// Replica set name passed to the engine.
    pub repl_set: Option<String>,
    /// Oplog size in megabytes; zero leaves the engine default.
    pub oplog_size: u32,
    /// Executable naming policy: `uuid` or `user`.
    pub executable_naming: String,
    /// Fixed artifact store directory.
    pub artifact_directory: Option<Utf8PathBuf>,
    /// Seconds between data file syncs; zero disables them.
    pub sync_delay: Option<u32>,
    /// Data imports run after start.
    pub imports: Vec<ImportJobConfig>,
    /// Database used by imports that do not name one.
    pub default_import_database: Option<String>,
    /// Run imports concurrently.
    pub parallel: bool,
    /// Script initializations run after imports.
    pub initializations: Vec<InitializationConfig>,
    /// Replica set initiation run first after start.
    pub repl_set_initiate: Option<ReplSetInitiateConfig>,
    /// Skip both start and stop.
    pub skip: bool,
    /// Filter expression for the orchestrator's diagnostics.
    pub log_filter: String,
    /// Format of the orchestrator's diagnostics.
    pub log_format: LogFormat,
    /// Directory holding hand-off records; platform default when unset.
    pub runtime_dir: Option<Utf8PathBuf>,
    /// Properties file the chosen port is written to.
    pub port_file: Option<Utf8PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            random_port: false,
            version: None,
            features: Vec::new(),
            database_directory: None,
            bind_ip: None,
            proxy_host: None,
            proxy_port: None,
            proxy_user: None,
            proxy_password: None,
            wait: false,
            logging: DEFAULT_LOGGING.to_owned(),
            log_file: DEFAULT_LOG_FILE.to_owned(),
            log_file_encoding: DEFAULT_LOG_FILE_ENCODING.to_owned(),
            download_path: DEFAULT_DOWNLOAD_PATH.to_owned(),
            auth_enabled: false,
            repl_set: None,
            oplog_size: 0,
            executable_naming: DEFAULT_EXECUTABLE_NAMING.to_owned(),
            artifact_directory: None,
            sync_delay: None,
            imports: Vec::new(),
            default_import_database: None,
            parallel: false,
            initializations: Vec::new(),
            repl_set_initiate: None,
            skip: false,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: LogFormat::default(),
            runtime_dir: None,
            port_file: None,
        }
    }
}

impl Config {
    /// Loads configuration from every layer described by `sources`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] when an explicitly named file does
    /// not exist, and [`ConfigError::Load`] when any layer fails to parse.
    pub fn load(sources: &ConfigSources) -> Result<Self, ConfigError> {
        Self::figment(sources)?
            .extract()
            .map_err(|error| ConfigError::Load(Box::new(error)))
    }

    /// Builds the layered figment without extracting it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] when an explicitly named file does
    /// not exist.
    pub fn figment(sources: &ConfigSources) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        match sources.explicit_path() {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::MissingFile { path });
                }
                figment = figment.merge(Toml::file(path.as_std_path()));
            }
            None => {
                figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
            }
        }
        let ignored: Vec<&str> = iter::once("config_path")
            .chain(TEXT_KEYS.iter().copied())
            .collect();
        Ok(figment
            .merge(Env::prefixed(ENV_PREFIX).ignore(&ignored))
            .merge(Serialized::defaults(text_environment()))
            .merge(Serialized::defaults(&sources.overrides)))
    }

    /// Directory holding hand-off records.
    #[must_use]
    pub fn runtime_dir(&self) -> Utf8PathBuf {
        self.runtime_dir.clone().unwrap_or_else(default_runtime_dir)
    }

    /// Returns the configured log filter.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Returns the configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Inputs for [`Config::load`] beyond the process environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Configuration file named on the command line.
    pub config_path: Option<Utf8PathBuf>,
    /// Values given on the command line, applied last.
    pub overrides: ConfigOverrides,
}

impl ConfigSources {
    fn explicit_path(&self) -> Option<Utf8PathBuf> {
        self.config_path.clone().or_else(|| {
            env::var(CONFIG_PATH_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .map(Utf8PathBuf::from)
        })
    }
}

/// Command-line values that take precedence over every other layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigOverrides {
    /// Overrides `port`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Overrides `random_port`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub random_port: Option<bool>,
    /// Overrides `version`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Overrides `wait`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait: Option<bool>,
    /// Overrides `skip`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<bool>,
    /// Overrides `log_filter`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    /// Overrides `runtime_dir`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_dir: Option<Utf8PathBuf>,
}

fn text_environment() -> BTreeMap<String, String> {
    Env::prefixed(ENV_PREFIX)
        .only(TEXT_KEYS)
        .iter()
        .map(|(key, value)| (key.as_str().to_ascii_lowercase(), value))
        .collect()
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The named configuration file does not exist.
    #[error("configuration file '{path}' does not exist")]
    MissingFile {
        /// Path that was requested.
        path: Utf8PathBuf,
    },
    /// A configuration layer could not be parsed.
    #[error("failed to load configuration: {0}")]
    Load(#[source] Box<figment::Error>),
}
