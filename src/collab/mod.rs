//! External collaborator contracts.
//!
//! The linter, formatter, and completion engine are external processes built
//! for plain Python. This module defines the data they exchange with the
//! core and the subprocess-backed implementations used in production. The
//! core never depends on a specific tool: anything implementing the traits
//! in `lint` and `completion` can be plugged in (tests use in-memory stubs).

mod completion;
mod lint;
mod process;

pub use completion::{CompletionEngine, JediCompleter};
pub use lint::{Formatter, Linter, RuffFormatter, RuffLinter};

use serde::Deserialize;
use thiserror::Error;

use crate::document::{Severity, SourceSpan};

/// Failure modes of an external collaborator.
#[derive(Debug, Error)]
pub enum CollabError {
    /// The tool is missing or cannot be spawned. Surfaced to the user once,
    /// then short-circuited until the next document re-open.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    /// The tool ran but exited abnormally.
    #[error("collaborator failed: {0}")]
    Failed(String),
    /// The tool produced output the shim could not decode.
    #[error("malformed collaborator output: {0}")]
    Protocol(String),
}

/// A diagnostic as reported by the linter, in virtual-file coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDiagnostic {
    pub span: SourceSpan,
    pub severity: Severity,
    pub code: Option<String>,
    pub message: String,
}

/// A completion candidate as reported by the completion engine.
///
/// `kind` is the engine's own type string (module, class, function, ...);
/// the LSP layer maps it to a `CompletionItemKind`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCompletionItem {
    pub label: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
    pub insert_text: String,
}
