//! Replica set initiation.

use embedmongo_config::{ReplSetInitiateConfig, ReplSetMemberConfig, ReplSetSettingsConfig};
use serde_json::{Map, Value, json};
use tracing::info;

use super::{PIPELINE_TARGET, PipelineTarget};
use crate::errors::OrchestratorError;

/// Database administrative commands are issued against.
pub const ADMIN_DATABASE: &str = "admin";

/// Builds the `replSetInitiate` command document.
///
/// Unset values are omitted rather than sent as nulls.
#[must_use]
pub fn replset_command(config: &ReplSetInitiateConfig) -> Value {
    json!({ "replSetInitiate": initiate_document(config) })
}

fn initiate_document(config: &ReplSetInitiateConfig) -> Value {
    let mut document = Map::new();
    if let Some(id) = config.id.as_deref().filter(|id| !id.is_empty()) {
        document.insert("_id".to_owned(), json!(id));
    }
    insert_some(&mut document, "version", config.version);
    if !config.members.is_empty() {
        let members = config.members.iter().map(member_document).collect();
        document.insert("members".to_owned(), Value::Array(members));
    }
    if let Some(settings) = &config.settings {
        document.insert("settings".to_owned(), settings_document(settings));
    }
    Value::Object(document)
}

fn member_document(member: &ReplSetMemberConfig) -> Value {
    let mut document = Map::new();
    insert_some(&mut document, "_id", member.id);
    if let Some(host) = member.host.as_deref().filter(|host| !host.is_empty()) {
        document.insert("host".to_owned(), json!(host));
    }
    insert_some(&mut document, "arbiterOnly", member.arbiter_only);
    insert_some(&mut document, "buildIndexes", member.build_indexes);
    insert_some(&mut document, "hidden", member.hidden);
    insert_some(&mut document, "priority", member.priority);
    if !member.tags.is_empty() {
        document.insert("tags".to_owned(), json!(member.tags));
    }
    insert_some(&mut document, "slaveDelay", member.slave_delay);
    insert_some(&mut document, "votes", member.votes);
    Value::Object(document)
}

fn settings_document(settings: &ReplSetSettingsConfig) -> Value {
    let mut document = Map::new();
    insert_some(&mut document, "chainingAllowed", settings.chaining_allowed);
    insert_some(
        &mut document,
        "heartbeatTimeoutSecs",
        settings.heartbeat_timeout_secs,
    );
    if !settings.get_last_error_modes.is_empty() {
        let modes = settings
            .get_last_error_modes
            .iter()
            .map(|mode| (mode.write_concern.clone(), json!(mode.tags)))
            .collect::<Map<_, _>>();
        document.insert("getLastErrorModes".to_owned(), Value::Object(modes));
    }
    Value::Object(document)
}

fn insert_some<T: Into<Value>>(document: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        document.insert(key.to_owned(), value.into());
    }
}

/// Issues `replSetInitiate` once against the admin database.
///
/// # Errors
///
/// Returns [`OrchestratorError::ReplicaSet`] when the command cannot be
/// delivered or the server rejects it. Nothing is retried.
pub(crate) fn initiate(
    target: &PipelineTarget<'_>,
    config: &ReplSetInitiateConfig,
) -> Result<(), OrchestratorError> {
    let command = replset_command(config);
    info!(target: PIPELINE_TARGET, %command, "initiating replica set");
    let delivery_error = |source| OrchestratorError::ReplicaSet {
        message: "unable to deliver replSetInitiate".to_owned(),
        source: Some(source),
    };
    let session = target
        .engine
        .admin(target.distribution, target.net, ADMIN_DATABASE)
        .map_err(delivery_error)?;
    let result = session.run_command(&command).map_err(delivery_error)?;
    if !result.ok {
        return Err(OrchestratorError::ReplicaSet {
            message: result
                .error_message
                .unwrap_or_else(|| "server rejected replSetInitiate".to_owned()),
            source: None,
        });
    }
    target.reporter.replica_set_initiated(&command);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedmongo_config::GetLastErrorModeConfig;
    use rstest::rstest;
    use std::collections::BTreeMap;

    #[rstest]
    fn empty_configuration_sends_empty_document() {
        assert_eq!(
            replset_command(&ReplSetInitiateConfig::default()),
            json!({ "replSetInitiate": {} })
        );
    }

    #[rstest]
    fn hidden_is_independent_of_arbiter_only() {
        let config = ReplSetInitiateConfig {
            id: Some("rs0".to_owned()),
            version: Some(1),
            members: vec![ReplSetMemberConfig {
                id: Some(0),
                host: Some("localhost:27017".to_owned()),
                arbiter_only: Some(false),
                hidden: Some(true),
                ..ReplSetMemberConfig::default()
            }],
            settings: None,
        };

        assert_eq!(
            replset_command(&config),
            json!({
                "replSetInitiate": {
                    "_id": "rs0",
                    "version": 1,
                    "members": [{
                        "_id": 0,
                        "host": "localhost:27017",
                        "arbiterOnly": false,
                        "hidden": true
                    }]
                }
            })
        );
    }

    #[rstest]
    fn member_tags_and_settings_are_rendered() {
        let config = ReplSetInitiateConfig {
            members: vec![ReplSetMemberConfig {
                id: Some(1),
                build_indexes: Some(true),
                priority: Some(2),
                tags: BTreeMap::from([("dc".to_owned(), "east".to_owned())]),
                slave_delay: Some(3600),
                votes: Some(1),
                ..ReplSetMemberConfig::default()
            }],
            settings: Some(ReplSetSettingsConfig {
                chaining_allowed: Some(false),
                heartbeat_timeout_secs: Some(10),
                get_last_error_modes: vec![
                    GetLastErrorModeConfig {
                        write_concern: "multiDC".to_owned(),
                        tags: BTreeMap::from([("dc".to_owned(), 2)]),
                    },
                    GetLastErrorModeConfig {
                        write_concern: "any".to_owned(),
                        tags: BTreeMap::new(),
                    },
                ],
            }),
            ..ReplSetInitiateConfig::default()
        };

        assert_eq!(
            replset_command(&config)["replSetInitiate"],
            json!({
                "members": [{
                    "_id": 1,
                    "buildIndexes": true,
                    "priority": 2,
                    "tags": { "dc": "east" },
                    "slaveDelay": 3600,
                    "votes": 1
                }],
                "settings": {
                    "chainingAllowed": false,
                    "heartbeatTimeoutSecs": 10,
                    "getLastErrorModes": { "multiDC": { "dc": 2 }, "any": {} }
                }
            })
        );
    }

    #[rstest]
    fn blank_identifiers_are_omitted() {
        let config = ReplSetInitiateConfig {
            id: Some(String::new()),
            members: vec![ReplSetMemberConfig {
                host: Some(String::new()),
                ..ReplSetMemberConfig::default()
            }],
            ..ReplSetInitiateConfig::default()
        };

        assert_eq!(
            replset_command(&config),
            json!({ "replSetInitiate": { "members": [{}] } })
        );
    }
}
