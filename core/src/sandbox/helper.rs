//! JSON request/response protocol shared by out-of-process helpers and
//! isolated workers.
//!
//! The request `{"function": name, "args": value}` goes to stdin. A helper
//! answers on stdout with `{"result": value}` and exit status zero, or with
//! `{"error": message}` (optionally `"error_class"`) and a non-zero status.

use super::process::IsolatedCommand;
use crate::error::{Result, UpdateError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
pub(crate) struct HelperRequest<'a> {
    pub function: &'a str,
    pub args: &'a Value,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HelperResponse {
    /// `None` only when the key is missing; `"result": null` is `Some(Null)`
    #[serde(default, deserialize_with = "present")]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_class: Option<String>,
}

impl HelperResponse {
    /// Parse the last JSON object on stdout; helpers may print progress
    /// lines before it
    pub fn parse(stdout: &str) -> Option<Self> {
        stdout
            .lines()
            .rev()
            .map(str::trim)
            .filter(|line| line.starts_with('{'))
            .find_map(|line| serde_json::from_str(line).ok())
            .or_else(|| serde_json::from_str(stdout.trim()).ok())
    }
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

pub(crate) fn encode_request(function: &str, args: &Value) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&HelperRequest { function, args })?)
}

/// Invoke `function` in an external helper program and return its result.
///
/// Any failure becomes `HelperSubprocessFailed` carrying the raw stdout,
/// stderr and exit status. That includes a zero exit whose output has no
/// `result` key.
pub async fn run_helper_process(command: IsolatedCommand, function: &str, args: &Value) -> Result<Value> {
    let description = command.describe();
    let command = command.stdin(encode_request(function, args)?);
    debug!(helper = %description, function, "running helper");

    let output = match command.execute().await {
        Ok(Some(output)) => output,
        Ok(None) => {
            return Err(UpdateError::HelperSubprocessFailed {
                message: format!("{function} timed out"),
                stdout: String::new(),
                stderr: String::new(),
                status: None,
            });
        }
        Err(err) => {
            return Err(UpdateError::HelperSubprocessFailed {
                message: format!("failed to start {description}: {err}"),
                stdout: String::new(),
                stderr: String::new(),
                status: None,
            });
        }
    };

    let response = HelperResponse::parse(&output.stdout);
    match response {
        Some(HelperResponse {
            result: Some(result),
            error: None,
            ..
        }) if output.success => Ok(result),
        response => {
            let message = response
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("{function} exited without a result"));
            warn!(helper = %description, function, status = ?output.status, "helper failed");
            Err(UpdateError::HelperSubprocessFailed {
                message,
                stdout: output.stdout,
                stderr: output.stderr,
                status: output.status,
            })
        }
    }
}
