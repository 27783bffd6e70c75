//! Replica set initiation settings.
//!
//! Every field is optional so that unset values can be left out of the
//! `replSetInitiate` command entirely.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level replica set configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplSetInitiateConfig {
    /// Replica set name, sent as `_id`.
    #[serde(default)]
    pub id: Option<String>,
    /// Configuration version.
    #[serde(default)]
    pub version: Option<i32>,
    /// Members in declaration order.
    #[serde(default)]
    pub members: Vec<ReplSetMemberConfig>,
    /// Replica set wide settings.
    #[serde(default)]
    pub settings: Option<ReplSetSettingsConfig>,
}

/// A single replica set member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplSetMemberConfig {
    /// Member ordinal, sent as `_id`.
    #[serde(default)]
    pub id: Option<i32>,
    /// `host:port` of the member.
    #[serde(default)]
    pub host: Option<String>,
    /// Whether the member only votes.
    #[serde(default)]
    pub arbiter_only: Option<bool>,
    /// Whether the member builds indexes.
    #[serde(default)]
    pub build_indexes: Option<bool>,
    /// Whether the member is hidden from clients.
    #[serde(default)]
    pub hidden: Option<bool>,
    /// Election priority.
    #[serde(default)]
    pub priority: Option<i32>,
    /// Member tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Replication delay in seconds.
    #[serde(default)]
    pub slave_delay: Option<i32>,
    /// Number of votes.
    #[serde(default)]
    pub votes: Option<i32>,
}

/// Replica set wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplSetSettingsConfig {
    /// Whether secondaries may replicate from other secondaries.
    #[serde(default)]
    pub chaining_allowed: Option<bool>,
    /// Heartbeat timeout in seconds.
    #[serde(default)]
    pub heartbeat_timeout_secs: Option<i32>,
    /// Named write concerns.
    #[serde(default)]
    pub get_last_error_modes: Vec<GetLastErrorModeConfig>,
}

/// A named write concern mapping tag names to the number of distinct values
/// that must acknowledge a write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLastErrorModeConfig {
    /// Name of the write concern.
    pub write_concern: String,
    /// Tag name to acknowledgement count.
    #[serde(default)]
    pub tags: BTreeMap<String, u32>,
}
