//! Derives the launch plan from declared settings.
//!
//! Building reads configuration and may allocate a port; it never launches a
//! process or touches the network.

use std::io;
use std::net::ToSocketAddrs;
use std::path::{self, PathBuf};
use std::sync::Arc;

use embedmongo_config::{Config, ExecutableNamingPolicy, OutputStyle};
use embedmongo_engine::{
    AUTH_FLAG, ArtifactRetrievalConfig, CommandLinePostProcessor, ExecutableNaming, NO_AUTH_FLAG,
    Net, OutputSinkConfig, PassThrough, ProxyCredentials, ProxySettings, RunConfiguration,
    RuntimeSettings, Storage, SyncDelay,
};
use tracing::debug;
use url::Url;

use crate::errors::{ConfigurationError, OrchestratorError};
use crate::port::PortAllocator;
use crate::reporter::OrchestrationReporter;
use crate::version::resolve_version;

const BUILDER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::builder");

/// Proxy port used when only a proxy host is configured.
pub const DEFAULT_PROXY_PORT: u16 = 80;

const UTF8_COMPATIBLE_ENCODINGS: &[&str] = &["utf-8", "utf8", "us-ascii", "ascii"];

/// Everything needed to resolve and launch one engine process.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    /// Immutable launch configuration.
    pub run: RunConfiguration,
    /// Output, artifact and command-line settings.
    pub runtime: RuntimeSettings,
}

impl LaunchPlan {
    /// Port the engine will listen on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.run.net.port
    }
}

/// Builds a [`LaunchPlan`] from `config`.
///
/// In random-port mode `ports` is consulted exactly once; the chosen port is
/// recorded in the plan for every later step.
///
/// # Errors
///
/// Returns [`OrchestratorError::Configuration`] for unknown names or blank
/// required values, and [`OrchestratorError::Port`] when allocation fails.
pub fn build_plan(
    config: &Config,
    ports: &dyn PortAllocator,
    reporter: &dyn OrchestrationReporter,
) -> Result<LaunchPlan, OrchestratorError> {
    let version = resolve_version(config.version.as_deref(), &config.features, reporter)?;
    let output = output_sink(config)?;
    let artifacts = artifact_retrieval(config)?;
    let ipv6 = localhost_is_ipv6().map_err(|source| ConfigurationError::HostDetection {
        source: Arc::new(source),
    })?;
    let port = if config.random_port {
        ports.allocate()?
    } else {
        config.port
    };

    let run = RunConfiguration {
        version,
        net: Net {
            bind_ip: non_blank(config.bind_ip.as_deref()),
            port,
            ipv6,
        },
        storage: Storage {
            data_dir: database_directory(config)?,
            repl_set_name: non_blank(config.repl_set.as_deref()),
            oplog_size: config.oplog_size,
        },
        sync_delay: SyncDelay::from_seconds(config.sync_delay),
        auth_enabled: config.auth_enabled,
    };
    let post_processor: Arc<dyn CommandLinePostProcessor> = if config.auth_enabled {
        Arc::new(EnableAuth)
    } else {
        Arc::new(PassThrough)
    };
    debug!(target: BUILDER_TARGET, ?run, "launch configuration built");

    Ok(LaunchPlan {
        run,
        runtime: RuntimeSettings {
            output,
            artifacts,
            post_processor,
        },
    })
}

/// Anchors a relative database directory at the working directory so the
/// engine and a later `stop` agree on its location.
fn database_directory(config: &Config) -> Result<Option<PathBuf>, ConfigurationError> {
    let Some(dir) = config
        .database_directory
        .as_ref()
        .filter(|dir| !dir.as_str().trim().is_empty())
    else {
        return Ok(None);
    };
    path::absolute(dir.as_std_path())
        .map(Some)
        .map_err(|source| ConfigurationError::DatabaseDirectory {
            path: dir.clone().into_std_path_buf(),
            source: Arc::new(source),
        })
}

/// Maps the `logging` style and its file settings to an output sink.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] for an unknown style, or for a file style
/// without a usable path or encoding.
pub fn output_sink(config: &Config) -> Result<OutputSinkConfig, ConfigurationError> {
    let style = config.logging.trim().parse::<OutputStyle>().map_err(|_| {
        ConfigurationError::UnknownOutputStyle {
            name: config.logging.clone(),
        }
    })?;
    match style {
        OutputStyle::Console => Ok(OutputSinkConfig::Console),
        OutputStyle::Discard => Ok(OutputSinkConfig::Discard),
        OutputStyle::File => {
            let path = config.log_file.trim();
            if path.is_empty() {
                return Err(ConfigurationError::MissingLogFile);
            }
            let encoding = config.log_file_encoding.trim();
            if encoding.is_empty() {
                return Err(ConfigurationError::MissingLogEncoding);
            }
            if !UTF8_COMPATIBLE_ENCODINGS
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(encoding))
            {
                return Err(ConfigurationError::UnsupportedEncoding {
                    encoding: encoding.to_owned(),
                });
            }
            Ok(OutputSinkConfig::File {
                path: PathBuf::from(path),
                encoding: encoding.to_owned(),
            })
        }
    }
}

/// Derives download, proxy and staging settings.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] for an unknown naming policy or an
/// unusable download location.
pub fn artifact_retrieval(config: &Config) -> Result<ArtifactRetrievalConfig, ConfigurationError> {
    let naming = match config
        .executable_naming
        .trim()
        .parse::<ExecutableNamingPolicy>()
    {
        Ok(ExecutableNamingPolicy::UniquePerRun) => ExecutableNaming::UniquePerRun,
        Ok(ExecutableNamingPolicy::StablePerUser) => ExecutableNaming::StablePerUser,
        Err(_) => {
            return Err(ConfigurationError::UnknownNamingPolicy {
                name: config.executable_naming.clone(),
            });
        }
    };

    let download_base = download_base(&config.download_path)?;
    let proxy = proxy_settings(config);
    if proxy.is_some() && download_base.host_str().is_none() {
        return Err(ConfigurationError::DownloadPathWithoutHost {
            location: config.download_path.clone(),
        });
    }

    Ok(ArtifactRetrievalConfig {
        download_base,
        proxy,
        store_dir: config
            .artifact_directory
            .as_ref()
            .map(|dir| dir.clone().into_std_path_buf()),
        naming,
    })
}

fn download_base(location: &str) -> Result<Url, ConfigurationError> {
    let trimmed = location.trim();
    // Relative joins replace the last segment unless the base ends in '/'.
    let normalised = if trimmed.ends_with('/') {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&normalised).map_err(|source| ConfigurationError::InvalidDownloadPath {
        location: location.to_owned(),
        source,
    })
}

fn proxy_settings(config: &Config) -> Option<ProxySettings> {
    let host = non_blank(config.proxy_host.as_deref())?;
    let credentials = match (
        non_blank(config.proxy_user.as_deref()),
        config.proxy_password.clone().filter(|p| !p.is_empty()),
    ) {
        (Some(user), Some(password)) => Some(ProxyCredentials { user, password }),
        _ => None,
    };
    Some(ProxySettings {
        host,
        port: config.proxy_port.unwrap_or(DEFAULT_PROXY_PORT),
        credentials,
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Whether `localhost` resolves to an IPv6 address first.
fn localhost_is_ipv6() -> io::Result<bool> {
    let first = ("localhost", 0).to_socket_addrs()?.next();
    Ok(first.is_some_and(|addr| addr.is_ipv6()))
}

/// Replaces the default auth-disabling flag with an explicit enable flag.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnableAuth;

impl CommandLinePostProcessor for EnableAuth {
    fn process(&self, args: Vec<String>) -> Vec<String> {
        let mut args: Vec<String> = args.into_iter().filter(|arg| arg != NO_AUTH_FLAG).collect();
        args.push(AUTH_FLAG.to_owned());
        args
    }
}
