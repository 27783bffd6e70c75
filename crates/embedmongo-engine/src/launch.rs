//! Immutable launch configuration and the engine command line derived from it.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use crate::version::{EngineVersion, Feature};

/// Network settings for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Net {
    /// Address the engine binds to; all interfaces when unset.
    pub bind_ip: Option<String>,
    /// Listening port.
    pub port: u16,
    /// Whether the host prefers IPv6 loopback.
    pub ipv6: bool,
}

impl Net {
    /// Address used to reach the engine from this host.
    ///
    /// Unset or wildcard bind addresses resolve to the preferred loopback.
    #[must_use]
    pub fn connect_address(&self) -> SocketAddr {
        let loopback = if self.ipv6 {
            IpAddr::V6(Ipv6Addr::LOCALHOST)
        } else {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        };
        let ip = self
            .bind_ip
            .as_deref()
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
            .filter(|ip| !ip.is_unspecified())
            .unwrap_or(loopback);
        SocketAddr::new(ip, self.port)
    }
}

/// Storage and replication settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Storage {
    /// Data directory; the engine capability picks an ephemeral one when unset.
    pub data_dir: Option<PathBuf>,
    /// Replica set name.
    pub repl_set_name: Option<String>,
    /// Oplog size in megabytes; zero keeps the engine default.
    pub oplog_size: u32,
}

/// How often the engine flushes data files to disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncDelay {
    /// Leave the engine's own interval in place.
    #[default]
    EngineDefault,
    /// Flush every given number of seconds.
    Seconds(NonZeroU32),
    /// Never flush periodically.
    Disabled,
}

impl SyncDelay {
    /// Maps an optional number of seconds; zero disables periodic syncs.
    #[must_use]
    pub fn from_seconds(seconds: Option<u32>) -> Self {
        match seconds {
            None => Self::EngineDefault,
            Some(value) => NonZeroU32::new(value).map_or(Self::Disabled, Self::Seconds),
        }
    }

    /// Value passed to `--syncdelay`, if any.
    #[must_use]
    pub const fn argument(self) -> Option<u32> {
        match self {
            Self::EngineDefault => None,
            Self::Seconds(seconds) => Some(seconds.get()),
            Self::Disabled => Some(0),
        }
    }
}

/// Everything needed to start one engine process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    /// Release and features.
    pub version: EngineVersion,
    /// Network settings.
    pub net: Net,
    /// Storage and replication settings.
    pub storage: Storage,
    /// Sync-delay policy.
    pub sync_delay: SyncDelay,
    /// Whether authentication is enabled.
    pub auth_enabled: bool,
}

impl RunConfiguration {
    /// Default engine arguments for the given data directory.
    ///
    /// Authentication is disabled here; a [`CommandLinePostProcessor`]
    /// rewrites the list when it should be enabled.
    #[must_use]
    pub fn arguments(&self, data_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "--port".to_owned(),
            self.net.port.to_string(),
            "--dbpath".to_owned(),
            data_dir.display().to_string(),
            NO_AUTH_FLAG.to_owned(),
        ];
        if let Some(bind_ip) = self.net.bind_ip.as_deref().filter(|ip| !ip.trim().is_empty()) {
            args.extend(["--bind_ip".to_owned(), bind_ip.to_owned()]);
        }
        if self.net.ipv6 {
            args.push("--ipv6".to_owned());
        }
        if let Some(seconds) = self.sync_delay.argument() {
            args.extend(["--syncdelay".to_owned(), seconds.to_string()]);
        }
        if let Some(name) = self.storage.repl_set_name.as_deref().filter(|n| !n.is_empty()) {
            args.extend(["--replSet".to_owned(), name.to_owned()]);
        }
        if self.storage.oplog_size > 0 {
            args.extend(["--oplogSize".to_owned(), self.storage.oplog_size.to_string()]);
        }
        if self.version.enabled(Feature::TextSearch) {
            args.extend(["--setParameter".to_owned(), "textSearchEnabled=true".to_owned()]);
        }
        if self.version.enabled(Feature::NoHttpInterface) {
            args.push("--nohttpinterface".to_owned());
        }
        args
    }
}

/// Flag the default command line uses to disable authentication.
pub const NO_AUTH_FLAG: &str = "--noauth";

/// Flag that enables authentication.
pub const AUTH_FLAG: &str = "--auth";

/// Final rewrite of the engine command line before launch.
pub trait CommandLinePostProcessor: Send + Sync + fmt::Debug {
    /// Returns the arguments to launch with.
    fn process(&self, args: Vec<String>) -> Vec<String>;
}

/// Leaves the command line untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl CommandLinePostProcessor for PassThrough {
    fn process(&self, args: Vec<String>) -> Vec<String> {
        args
    }
}
