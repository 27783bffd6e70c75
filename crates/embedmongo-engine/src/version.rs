//! Engine releases and optional features.

use std::collections::BTreeSet;
use std::fmt;

use strum::{Display, EnumString};

/// Optional engine capabilities requested alongside a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, Display)]
pub enum Feature {
    /// Enable the text search parameter on releases that gate it.
    #[strum(serialize = "TEXT_SEARCH")]
    TextSearch,
    /// Only 64-bit distributions exist for the release.
    #[strum(serialize = "ONLY_64BIT")]
    Only64Bit,
    /// Disable the legacy HTTP status interface.
    #[strum(serialize = "NO_HTTP_INTERFACE")]
    NoHttpInterface,
}

/// A release present in the download catalogue.
#[derive(Debug, PartialEq, Eq)]
pub struct KnownRelease {
    token: &'static str,
    download_path: &'static str,
    features: &'static [Feature],
}

impl KnownRelease {
    /// Canonical token such as `V3_0_2`.
    #[must_use]
    pub const fn token(&self) -> &'static str {
        self.token
    }

    /// Version segment used in archive names, such as `3.0.2`.
    #[must_use]
    pub const fn download_path(&self) -> &'static str {
        self.download_path
    }

    /// Features the release always carries.
    #[must_use]
    pub const fn features(&self) -> &'static [Feature] {
        self.features
    }

    /// Looks up a canonical token.
    #[must_use]
    pub fn lookup(token: &str) -> Option<&'static Self> {
        RELEASES.iter().find(|release| release.token == token)
    }
}

macro_rules! releases {
    ($($token:literal => $path:literal $([$($feature:ident),*])?;)*) => {
        &[$(KnownRelease {
            token: $token,
            download_path: $path,
            features: &[$($(Feature::$feature),*)?],
        }),*]
    };
}

static RELEASES: &[KnownRelease] = releases! {
    "V1_6_5" => "1.6.5";
    "V1_8_5" => "1.8.5";
    "V2_0_9" => "2.0.9";
    "V2_2_7" => "2.2.7";
    "V2_4_0" => "2.4.0";
    "V2_4_5" => "2.4.5";
    "V2_4_9" => "2.4.9";
    "V2_4_10" => "2.4.10";
    "V2_4_14" => "2.4.14";
    "V2_6_0" => "2.6.0";
    "V2_6_5" => "2.6.5";
    "V2_6_10" => "2.6.10";
    "V3_0_0" => "3.0.0";
    "V3_0_1" => "3.0.1";
    "V3_0_2" => "3.0.2";
    "V3_0_3" => "3.0.3";
    "V3_0_4" => "3.0.4";
    "V3_0_5" => "3.0.5";
    "V3_0_6" => "3.0.6";
    "V3_0_7" => "3.0.7";
    "V3_2_0" => "3.2.0" [Only64Bit];
    "V3_2_1" => "3.2.1" [Only64Bit];
};

/// Release used when no version is requested.
pub const PRODUCTION_TOKEN: &str = "V3_0_7";

/// The release used when no version is requested.
///
/// # Panics
///
/// Never; the token is part of the static catalogue.
#[must_use]
#[expect(
    clippy::expect_used,
    reason = "the production token is a compile-time member of RELEASES"
)]
pub fn production() -> &'static KnownRelease {
    KnownRelease::lookup(PRODUCTION_TOKEN).expect("production release is catalogued")
}

/// A resolved release: either catalogued or an arbitrary version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionDescriptor {
    /// A catalogued release.
    Known(&'static KnownRelease),
    /// An uncatalogued version attempted verbatim.
    Passthrough(String),
}

impl VersionDescriptor {
    /// Version segment used in archive names.
    #[must_use]
    pub fn download_path(&self) -> &str {
        match self {
            Self::Known(release) => release.download_path,
            Self::Passthrough(raw) => raw,
        }
    }

    /// Canonical token for catalogued releases.
    #[must_use]
    pub const fn token(&self) -> Option<&'static str> {
        match self {
            Self::Known(release) => Some(release.token),
            Self::Passthrough(_) => None,
        }
    }

    /// Whether the release is outside the catalogue.
    #[must_use]
    pub const fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough(_))
    }
}

/// A release together with the features enabled for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVersion {
    descriptor: VersionDescriptor,
    features: BTreeSet<Feature>,
}

impl EngineVersion {
    /// Combines a descriptor with requested features.
    ///
    /// Catalogued releases contribute their own features as well.
    #[must_use]
    pub fn new(descriptor: VersionDescriptor, requested: impl IntoIterator<Item = Feature>) -> Self {
        let mut features: BTreeSet<Feature> = requested.into_iter().collect();
        if let VersionDescriptor::Known(release) = &descriptor {
            features.extend(release.features.iter().copied());
        }
        Self {
            descriptor,
            features,
        }
    }

    /// The underlying release descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &VersionDescriptor {
        &self.descriptor
    }

    /// Version segment used in archive names.
    #[must_use]
    pub fn download_path(&self) -> &str {
        self.descriptor.download_path()
    }

    /// Whether a feature is enabled.
    #[must_use]
    pub fn enabled(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// Enabled features in a stable order.
    pub fn features(&self) -> impl Iterator<Item = Feature> + '_ {
        self.features.iter().copied()
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.download_path())
    }
}
