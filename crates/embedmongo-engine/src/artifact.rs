//! Distribution download, extraction and executable staging.

use std::env;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::error::EngineError;
use crate::network::{NetworkEnvironment, ProxySettings};
use crate::version::{EngineVersion, Feature};

const ARTIFACT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::artifact");

/// Directory under the home directory used when no store is configured.
pub const DEFAULT_STORE_DIR_NAME: &str = ".embedmongo";

/// How executables copied out of the store are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableNaming {
    /// A random name per run.
    UniquePerRun,
    /// A name derived from the current user, reused across runs.
    StablePerUser,
}

impl ExecutableNaming {
    /// File name for a staged copy of `executable`.
    #[must_use]
    pub fn file_name(self, executable: &str) -> String {
        let discriminator = match self {
            Self::UniquePerRun => Uuid::new_v4().simple().to_string(),
            Self::StablePerUser => current_user(),
        };
        format!("embedmongo-{discriminator}-{executable}{}", env::consts::EXE_SUFFIX)
    }
}

fn current_user() -> String {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .find_map(|key| env::var(key).ok())
        .filter(|name| !name.trim().is_empty())
        .map_or_else(|| "user".to_owned(), |name| sanitise(&name))
}

fn sanitise(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Where and how distributions are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRetrievalConfig {
    /// Base URL distributions are published under.
    pub download_base: Url,
    /// Proxy applied to the download host.
    pub proxy: Option<ProxySettings>,
    /// Fixed store directory; `~/.embedmongo` when unset.
    pub store_dir: Option<PathBuf>,
    /// Naming policy for staged executables.
    pub naming: ExecutableNaming,
}

impl ArtifactRetrievalConfig {
    /// Directory downloaded and extracted distributions live in.
    #[must_use]
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(env::temp_dir)
                .join(DEFAULT_STORE_DIR_NAME)
        })
    }

    /// Host distributions are downloaded from.
    #[must_use]
    pub fn download_host(&self) -> Option<&str> {
        self.download_base.host_str()
    }
}

/// Operating system and architecture segments used in archive names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    os: &'static str,
    arch: &'static str,
}

impl Platform {
    /// Platform of the running process.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnsupportedPlatform`] when no archive exists.
    pub fn current() -> Result<Self, EngineError> {
        Self::from_parts(env::consts::OS, env::consts::ARCH)
    }

    fn from_parts(os: &'static str, arch: &'static str) -> Result<Self, EngineError> {
        let archive_os = match os {
            "linux" => "linux",
            "macos" => "osx",
            _ => return Err(EngineError::UnsupportedPlatform { os, arch }),
        };
        let archive_arch = match arch {
            "x86_64" => "x86_64",
            "x86" => "i686",
            _ => return Err(EngineError::UnsupportedPlatform { os, arch }),
        };
        Ok(Self {
            os: archive_os,
            arch: archive_arch,
        })
    }

    fn is_64bit(self) -> bool {
        self.arch == "x86_64"
    }

    /// Archive stem, such as `mongodb-linux-x86_64-3.0.2`.
    #[must_use]
    pub fn archive_stem(self, version: &EngineVersion) -> String {
        format!("mongodb-{}-{}-{}", self.os, self.arch, version.download_path())
    }

    /// Download URL of the archive for `version`.
    ///
    /// # Errors
    ///
    /// Returns an error when the joined URL is invalid.
    pub fn download_url(self, base: &Url, version: &EngineVersion) -> Result<Url, EngineError> {
        let location = format!("{}/{}.tgz", self.os, self.archive_stem(version));
        base.join(&location)
            .map_err(|source| EngineError::InvalidUrl { location, source })
    }
}

/// An extracted distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    bin_dir: PathBuf,
}

impl Distribution {
    /// Wraps a directory holding the engine executables.
    #[must_use]
    pub fn new(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
        }
    }

    /// Directory holding the engine executables.
    #[must_use]
    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    /// Path to a bundled executable.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingExecutable`] when it is absent.
    pub fn executable(&self, name: &str) -> Result<PathBuf, EngineError> {
        let path = self
            .bin_dir
            .join(format!("{name}{}", env::consts::EXE_SUFFIX));
        if path.is_file() {
            Ok(path)
        } else {
            Err(EngineError::MissingExecutable {
                name: name.to_owned(),
                bin_dir: self.bin_dir.clone(),
            })
        }
    }

    /// Copies an executable to the temporary directory under `naming`.
    ///
    /// Stable names are reused when the copy already exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the executable is missing or cannot be copied.
    pub fn stage(&self, name: &str, naming: ExecutableNaming) -> Result<PathBuf, EngineError> {
        let source = self.executable(name)?;
        let target = env::temp_dir().join(naming.file_name(name));
        if naming == ExecutableNaming::StablePerUser && target.is_file() {
            return Ok(target);
        }
        fs::copy(&source, &target).map_err(|error| EngineError::io(&target, error))?;
        debug!(
            target: ARTIFACT_TARGET,
            source = %source.display(),
            staged = %target.display(),
            "staged executable"
        );
        Ok(target)
    }
}

/// Local cache of downloaded and extracted distributions.
pub struct ArtifactStore<'a> {
    config: &'a ArtifactRetrievalConfig,
    network: &'a dyn NetworkEnvironment,
}

impl<'a> ArtifactStore<'a> {
    /// Creates a store view over `config`.
    #[must_use]
    pub fn new(config: &'a ArtifactRetrievalConfig, network: &'a dyn NetworkEnvironment) -> Self {
        Self { config, network }
    }

    /// Ensures the distribution for `version` is extracted locally.
    ///
    /// # Errors
    ///
    /// Returns an error when the archive cannot be downloaded or extracted.
    pub fn resolve(&self, version: &EngineVersion) -> Result<Distribution, EngineError> {
        let platform = Platform::current()?;
        if version.enabled(Feature::Only64Bit) && !platform.is_64bit() {
            return Err(EngineError::UnsupportedPlatform {
                os: env::consts::OS,
                arch: env::consts::ARCH,
            });
        }

        let stem = platform.archive_stem(version);
        let store = self.config.store_dir();
        let extracted = store.join("extracted").join(&stem);
        if extracted.join("bin").is_dir() {
            debug!(target: ARTIFACT_TARGET, path = %extracted.display(), "distribution cached");
            return Ok(Distribution::new(extracted.join("bin")));
        }

        let archive = store.join(platform.os).join(format!("{stem}.tgz"));
        if !archive.is_file() {
            let url = platform.download_url(&self.config.download_base, version)?;
            self.download(&url, &archive)?;
        }
        extract(&archive, &extracted)?;
        Ok(Distribution::new(extracted.join("bin")))
    }

    fn download(&self, url: &Url, destination: &Path) -> Result<(), EngineError> {
        info!(target: ARTIFACT_TARGET, url = %url, "downloading engine distribution");
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|error| EngineError::io(parent, error))?;
        }

        let client = self.network.http_client()?;
        let download_error = |source: reqwest::Error| EngineError::Download {
            url: url.to_string(),
            source: Arc::new(source),
        };
        let mut response = client
            .get(url.clone())
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(download_error)?;

        let partial = destination.with_extension("tgz.part");
        let mut file = File::create(&partial).map_err(|error| EngineError::io(&partial, error))?;
        response.copy_to(&mut file).map_err(download_error)?;
        fs::rename(&partial, destination).map_err(|error| EngineError::io(destination, error))?;
        Ok(())
    }
}

/// Unpacks `archive` so that `destination/bin` holds the executables.
fn extract(archive: &Path, destination: &Path) -> Result<(), EngineError> {
    let extract_error = |source: io::Error| EngineError::Extract {
        archive: archive.to_path_buf(),
        source: Arc::new(source),
    };
    let parent = destination
        .parent()
        .ok_or_else(|| extract_error(io::Error::other("destination has no parent")))?;
    fs::create_dir_all(parent).map_err(extract_error)?;

    let staging = parent.join(format!(".staging-{}", Uuid::new_v4().simple()));
    let file = File::open(archive).map_err(extract_error)?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(&staging)
        .map_err(extract_error)?;

    let root = distribution_root(&staging).map_err(extract_error)?;
    let renamed = fs::rename(&root, destination).map_err(extract_error);
    drop(fs::remove_dir_all(&staging));
    renamed
}

/// Finds the unpacked directory that contains `bin`.
fn distribution_root(staging: &Path) -> io::Result<PathBuf> {
    if staging.join("bin").is_dir() {
        return Ok(staging.to_path_buf());
    }
    for entry in fs::read_dir(staging)? {
        let path = entry?.path();
        if path.join("bin").is_dir() {
            return Ok(path);
        }
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        "archive does not contain a bin directory",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{KnownRelease, VersionDescriptor};
    use rstest::rstest;

    fn version(token: &str) -> EngineVersion {
        let release = KnownRelease::lookup(token).expect("catalogued release");
        EngineVersion::new(VersionDescriptor::Known(release), [])
    }

    #[rstest]
    fn linux_download_url_follows_archive_layout() {
        let platform = Platform::from_parts("linux", "x86_64").expect("supported platform");
        let base = Url::parse("http://fastdl.mongodb.org/").expect("valid url");

        let url = platform
            .download_url(&base, &version("V3_0_2"))
            .expect("valid download url");

        assert_eq!(
            url.as_str(),
            "http://fastdl.mongodb.org/linux/mongodb-linux-x86_64-3.0.2.tgz"
        );
    }

    #[rstest]
    fn macos_archives_use_osx_segment() {
        let platform = Platform::from_parts("macos", "x86_64").expect("supported platform");
        assert_eq!(
            platform.archive_stem(&version("V2_6_5")),
            "mongodb-osx-x86_64-2.6.5"
        );
    }

    #[rstest]
    fn unsupported_platform_is_rejected() {
        let error = Platform::from_parts("windows", "x86_64").expect_err("no archive");
        assert!(matches!(error, EngineError::UnsupportedPlatform { os: "windows", .. }));
    }

    #[rstest]
    fn unique_names_differ_per_call() {
        let first = ExecutableNaming::UniquePerRun.file_name("mongod");
        let second = ExecutableNaming::UniquePerRun.file_name("mongod");
        assert_ne!(first, second);
        assert!(first.starts_with("embedmongo-"));
    }

    #[rstest]
    fn stable_names_repeat() {
        assert_eq!(
            ExecutableNaming::StablePerUser.file_name("mongod"),
            ExecutableNaming::StablePerUser.file_name("mongod")
        );
    }

    #[rstest]
    fn extracts_archive_into_store() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let archive = dir.path().join("dist.tgz");
        write_archive(&archive, "mongodb-linux-x86_64-3.0.2/bin/mongod");

        let destination = dir.path().join("extracted").join("mongodb-linux-x86_64-3.0.2");
        extract(&archive, &destination).expect("archive should extract");

        let distribution = Distribution::new(destination.join("bin"));
        assert!(distribution.executable("mongod").is_ok());
        assert!(matches!(
            distribution.executable("mongoimport"),
            Err(EngineError::MissingExecutable { .. })
        ));
    }

    fn write_archive(path: &Path, entry: &str) {
        let file = File::create(path).expect("archive file");
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        let contents = b"#!/bin/sh\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, entry, &contents[..])
            .expect("append entry");
        builder
            .into_inner()
            .and_then(flate2::write::GzEncoder::finish)
            .expect("finish archive");
    }
}
