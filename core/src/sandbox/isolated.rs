use super::helper::{HelperResponse, encode_request};
use super::process::{IsolatedCommand, ProcessOutput};
use crate::error::{Result, UpdateError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

pub const TIMEOUT_ERROR_CLASS: &str = "Timeout";
pub const SPAWN_ERROR_CLASS: &str = "SpawnError";
pub const EXIT_ERROR_CLASS: &str = "NonZeroExit";

/// Run a worker that speaks the helper protocol in a separate process and
/// deserialize its result.
///
/// The worker's own failure is re-raised here as `ChildProcessFailed`,
/// keeping the worker's error class (`"error_class"` in its response) and
/// message so callers can classify it.
pub async fn with_isolated_execution<T>(command: IsolatedCommand, function: &str, args: &Value) -> Result<T>
where
    T: DeserializeOwned,
{
    let command = command.stdin(encode_request(function, args)?);
    let output = run_isolated_raw(&command).await?;
    let response = HelperResponse::parse(&output.stdout);

    match response {
        Some(HelperResponse {
            result: Some(result),
            error: None,
            ..
        }) if output.success => Ok(serde_json::from_value(result)?),
        Some(response) if response.error.is_some() || response.error_class.is_some() => {
            let message = response.error.unwrap_or_else(|| failure_message(function, &output));
            Err(UpdateError::ChildProcessFailed {
                error_class: response.error_class.unwrap_or_else(|| EXIT_ERROR_CLASS.to_string()),
                message,
                stderr: output.stderr,
            })
        }
        _ => Err(UpdateError::ChildProcessFailed {
            error_class: EXIT_ERROR_CLASS.to_string(),
            message: failure_message(function, &output),
            stderr: output.stderr,
        }),
    }
}

/// Stderr's last line, or a note that the worker never answered
fn failure_message(function: &str, output: &ProcessOutput) -> String {
    match last_line(&output.stderr) {
        line if line.is_empty() && output.success => format!("{function} exited without a result"),
        line => line,
    }
}

/// Run a plain command in isolation. A non-zero exit is a
/// `ChildProcessFailed` whose stderr callers classify themselves.
pub async fn run_isolated(command: &IsolatedCommand) -> Result<ProcessOutput> {
    let output = run_isolated_raw(command).await?;
    if output.success {
        return Ok(output);
    }
    Err(UpdateError::ChildProcessFailed {
        error_class: EXIT_ERROR_CLASS.to_string(),
        message: last_line(&output.stderr),
        stderr: output.stderr,
    })
}

async fn run_isolated_raw(command: &IsolatedCommand) -> Result<ProcessOutput> {
    match command.execute().await {
        Ok(Some(output)) => {
            debug!(command = %command.describe(), status = ?output.status, "isolated execution finished");
            Ok(output)
        }
        Ok(None) => Err(UpdateError::ChildProcessFailed {
            error_class: TIMEOUT_ERROR_CLASS.to_string(),
            message: format!("{} timed out", command.program()),
            stderr: String::new(),
        }),
        Err(err) => Err(UpdateError::ChildProcessFailed {
            error_class: SPAWN_ERROR_CLASS.to_string(),
            message: format!("failed to start {}: {err}", command.program()),
            stderr: String::new(),
        }),
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .to_string()
}
