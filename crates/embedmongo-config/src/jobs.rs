//! Declarative post-start jobs: data imports and script initializations.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::defaults::{default_import_timeout_ms, default_true};

/// One bulk import of a JSON array file into a collection.
///
/// Blank strings are treated the same as missing values during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportJobConfig {
    /// Target database; falls back to `default_import_database` when unset.
    #[serde(default)]
    pub database: Option<String>,
    /// Target collection.
    #[serde(default)]
    pub collection: Option<String>,
    /// JSON array file to import.
    #[serde(default)]
    pub file: Option<String>,
    /// Drop the collection before importing.
    #[serde(default = "default_true")]
    pub drop_on_import: bool,
    /// Upsert documents rather than insert them.
    #[serde(default = "default_true")]
    pub upsert_on_import: bool,
    /// Milliseconds to wait for the import process before giving up.
    #[serde(default = "default_import_timeout_ms")]
    pub timeout: u64,
}

impl Default for ImportJobConfig {
    fn default() -> Self {
        Self {
            database: None,
            collection: None,
            file: None,
            drop_on_import: true,
            upsert_on_import: true,
            timeout: default_import_timeout_ms(),
        }
    }
}

/// Scripts evaluated against one database after the engine starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializationConfig {
    /// Database the scripts run against. Required.
    #[serde(default)]
    pub database: Option<String>,
    /// Script files or directories of scripts, in evaluation order.
    #[serde(default)]
    pub scripts: Vec<Utf8PathBuf>,
}
