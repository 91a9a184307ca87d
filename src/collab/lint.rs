//! Linter and formatter collaborators (ruff).
//!
//! Both tools receive the complete virtual-file text on stdin and report in
//! virtual-file coordinates; translation back to original coordinates is the
//! position mapper's job, not theirs.

use serde::Deserialize;
use tower_lsp::async_trait;

use crate::document::{Severity, SourceSpan};

use super::process::{run, stderr_summary, stdout_utf8};
use super::{CollabError, RawDiagnostic};

/// External linter contract: full virtual text in, diagnostics in
/// virtual-file coordinates out.
#[async_trait]
pub trait Linter: Send + Sync {
    async fn lint(&self, virtual_text: &str) -> Result<Vec<RawDiagnostic>, CollabError>;
}

/// External formatter contract: full virtual text in, complete reformatted
/// text out.
#[async_trait]
pub trait Formatter: Send + Sync {
    async fn format(&self, virtual_text: &str) -> Result<String, CollabError>;
}

/// Name given to stdin content so the tool's per-file config applies.
const STDIN_FILENAME: &str = "virtual.py";

/// `ruff check` driven over stdin with JSON output.
pub struct RuffLinter {
    command: String,
    /// Rule classes that would fire on generated code, passed as `--ignore`.
    ignore: Vec<String>,
}

impl RuffLinter {
    pub fn new(command: impl Into<String>, ignore: Vec<String>) -> Self {
        Self {
            command: command.into(),
            ignore,
        }
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "check".to_string(),
            "--output-format".to_string(),
            "json".to_string(),
            "--stdin-filename".to_string(),
            STDIN_FILENAME.to_string(),
        ];
        for rule in &self.ignore {
            args.push("--ignore".to_string());
            args.push(rule.clone());
        }
        args.push("-".to_string());
        args
    }
}

/// One entry of ruff's JSON diagnostics output. Rows and columns are 1-based.
#[derive(Debug, Deserialize)]
struct RuffMessage {
    code: Option<String>,
    message: String,
    location: RuffLocation,
    end_location: Option<RuffLocation>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct RuffLocation {
    row: u32,
    column: u32,
}

impl RuffMessage {
    fn into_raw(self) -> RawDiagnostic {
        let start = self.location;
        let end = self.end_location.unwrap_or(start);
        // Syntax errors carry no rule code; style rules default to warning.
        let severity = match self.code.as_deref() {
            None => Severity::Error,
            Some(code) if code.starts_with("E9") => Severity::Error,
            Some(_) => Severity::Warning,
        };
        RawDiagnostic {
            span: SourceSpan::new(
                start.row.saturating_sub(1),
                start.column.saturating_sub(1),
                end.row.saturating_sub(1),
                end.column.saturating_sub(1),
            ),
            severity,
            code: self.code,
            message: self.message,
        }
    }
}

#[async_trait]
impl Linter for RuffLinter {
    async fn lint(&self, virtual_text: &str) -> Result<Vec<RawDiagnostic>, CollabError> {
        let output = run(&self.command, &self.args(), virtual_text.as_bytes()).await?;

        // Exit code 1 just means violations were found.
        if !matches!(output.status.code(), Some(0) | Some(1)) {
            return Err(CollabError::Failed(format!(
                "{}: {}",
                self.command,
                stderr_summary(&output)
            )));
        }

        let stdout = stdout_utf8(&output)?;
        let messages: Vec<RuffMessage> = serde_json::from_str(&stdout)
            .map_err(|e| CollabError::Protocol(format!("cannot decode ruff output: {e}")))?;
        Ok(messages.into_iter().map(RuffMessage::into_raw).collect())
    }
}

/// `ruff format` driven over stdin.
pub struct RuffFormatter {
    command: String,
}

impl RuffFormatter {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Formatter for RuffFormatter {
    async fn format(&self, virtual_text: &str) -> Result<String, CollabError> {
        let args = vec![
            "format".to_string(),
            "--stdin-filename".to_string(),
            STDIN_FILENAME.to_string(),
            "-".to_string(),
        ];
        let output = run(&self.command, &args, virtual_text.as_bytes()).await?;

        if !output.status.success() {
            return Err(CollabError::Failed(format!(
                "{}: {}",
                self.command,
                stderr_summary(&output)
            )));
        }
        stdout_utf8(&output)
    }
}
