use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output formats for the orchestrator's own diagnostics.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    Json,
    /// Human-readable single line output.
    #[default]
    Compact,
}

/// Destinations for the engine's standard output and error streams.
///
/// Parsed from the `logging` key; unknown names are rejected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OutputStyle {
    /// Pass engine output straight through to the orchestrator's console.
    Console,
    /// Append engine output to a log file.
    File,
    /// Drop engine output.
    #[strum(serialize = "none", serialize = "discard")]
    Discard,
}

/// Naming policy applied to executables extracted from the artifact store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum ExecutableNamingPolicy {
    /// A fresh random name per run.
    #[strum(serialize = "uuid")]
    UniquePerRun,
    /// A stable name derived from the current user, reused across runs.
    #[strum(serialize = "user")]
    StablePerUser,
}

/// Errors encountered while parsing a style or policy name.
pub type NameParseError = strum::ParseError;
