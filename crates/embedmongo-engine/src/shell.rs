//! Administrative commands issued through the distribution's `mongo` shell.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use crate::error::EngineError;
use crate::launch::Net;

const SHELL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::shell");

/// Reply to an administrative command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    /// Whether the server reported success.
    pub ok: bool,
    /// Server-reported failure message.
    pub error_message: Option<String>,
    /// Full reply document.
    pub document: Value,
}

impl CommandResult {
    /// Interprets a reply document.
    #[must_use]
    pub fn from_document(document: Value) -> Self {
        let ok = match document.get("ok") {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n >= 1.0),
            _ => false,
        };
        let error_message = document
            .get("errmsg")
            .and_then(Value::as_str)
            .map(str::to_owned);
        Self {
            ok,
            error_message,
            document,
        }
    }

    /// A successful reply with no payload.
    #[must_use]
    pub fn success() -> Self {
        Self::from_document(json!({ "ok": 1 }))
    }

    /// A failed reply carrying `message`.
    #[must_use]
    pub fn failure(message: &str) -> Self {
        Self::from_document(json!({ "ok": 0, "errmsg": message }))
    }
}

/// A connection to one database used for administrative commands.
pub trait AdminSession: Send {
    /// Runs a command document against the session's database.
    ///
    /// # Errors
    ///
    /// Returns an error when the command cannot be delivered or its reply
    /// cannot be read.
    fn run_command(&self, command: &Value) -> Result<CommandResult, EngineError>;

    /// Evaluates JavaScript on the server.
    ///
    /// # Errors
    ///
    /// Returns an error when the script cannot be delivered or its reply
    /// cannot be read.
    fn eval(&self, script: &str) -> Result<CommandResult, EngineError> {
        self.run_command(&json!({ "$eval": script, "args": [] }))
    }
}

/// Runs commands by invoking `mongo --eval` once per command.
#[derive(Debug, Clone)]
pub struct ShellAdminSession {
    shell: PathBuf,
    net: Net,
    database: String,
}

impl ShellAdminSession {
    /// Creates a session using the `shell` executable.
    #[must_use]
    pub fn new(shell: PathBuf, net: Net, database: impl Into<String>) -> Self {
        Self {
            shell,
            net,
            database: database.into(),
        }
    }

    fn shell_arguments(&self, command: &Value) -> Vec<String> {
        let address = self.net.connect_address();
        let mut args = vec![
            "--quiet".to_owned(),
            "--host".to_owned(),
            address.ip().to_string(),
            "--port".to_owned(),
            address.port().to_string(),
        ];
        if address.is_ipv6() {
            args.push("--ipv6".to_owned());
        }
        args.extend([
            self.database.clone(),
            "--eval".to_owned(),
            format!("print(JSON.stringify(db.runCommand({command})))"),
        ]);
        args
    }
}

impl AdminSession for ShellAdminSession {
    fn run_command(&self, command: &Value) -> Result<CommandResult, EngineError> {
        debug!(target: SHELL_TARGET, database = %self.database, %command, "running command");
        let output = Command::new(&self.shell)
            .args(self.shell_arguments(command))
            .stdin(Stdio::null())
            .output()
            .map_err(|error| EngineError::Spawn {
                program: self.shell.clone(),
                source: Arc::new(error),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Shell {
                status: output.status.to_string(),
                output: format!("{}{}", stdout.trim(), stderr.trim()),
            });
        }
        parse_reply(&stdout)
    }
}

/// Reads the reply from the last non-empty line of shell output.
pub(crate) fn parse_reply(stdout: &str) -> Result<CommandResult, EngineError> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    serde_json::from_str::<Value>(line)
        .map(CommandResult::from_document)
        .map_err(|source| EngineError::ShellOutput {
            output: line.to_owned(),
            source: Arc::new(source),
        })
}
