//! One-shot subprocess execution for collaborator tools.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::CollabError;

/// Run `command args...`, write `input` to its stdin, and collect its output.
///
/// A missing binary maps to `CollabError::Unavailable`; every other I/O
/// failure maps to `CollabError::Failed`.
pub(crate) async fn run(
    command: &str,
    args: &[String],
    input: &[u8],
) -> Result<std::process::Output, CollabError> {
    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                CollabError::Unavailable(format!("'{command}' not found on PATH"))
            }
            _ => CollabError::Failed(format!("failed to spawn '{command}': {e}")),
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input)
            .await
            .map_err(|e| CollabError::Failed(format!("failed to write to '{command}': {e}")))?;
        // Dropping the handle closes the pipe so the tool sees EOF.
    }

    child
        .wait_with_output()
        .await
        .map_err(|e| CollabError::Failed(format!("'{command}' did not finish: {e}")))
}

/// Decode a tool's stdout as UTF-8.
pub(crate) fn stdout_utf8(output: &std::process::Output) -> Result<String, CollabError> {
    String::from_utf8(output.stdout.clone())
        .map_err(|_| CollabError::Protocol("tool produced non-UTF-8 output".to_string()))
}

/// Summarize stderr for error messages.
pub(crate) fn stderr_summary(output: &std::process::Output) -> String {
    let text = String::from_utf8_lossy(&output.stderr);
    let line = text.lines().next().unwrap_or("");
    if line.is_empty() {
        format!("exit status {}", output.status)
    } else {
        line.to_string()
    }
}
