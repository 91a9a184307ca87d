//! Completion collaborator (jedi).
//!
//! Completion runs against the full virtual text, so jedi sees the script's
//! imports and class structure exactly as the linter does. The engine is
//! reached through a small Python shim that reads one JSON request from
//! stdin and writes one JSON response to stdout; anything implementing
//! `CompletionEngine` can stand in for it.

use serde_json::json;
use tower_lsp::async_trait;

use super::process::{run, stderr_summary, stdout_utf8};
use super::{CollabError, RawCompletionItem};

/// External completion contract. `line` is 1-based and `column` 0-based,
/// following jedi's convention.
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    async fn complete(
        &self,
        virtual_text: &str,
        line: u32,
        column: u32,
    ) -> Result<Vec<RawCompletionItem>, CollabError>;
}

/// Exit code the shim uses when the jedi package is not installed.
const EXIT_NO_JEDI: i32 = 3;

/// The stdin/stdout shim handed to the Python interpreter via `-c`.
const JEDI_SHIM: &str = r#"
import json
import sys

try:
    import jedi
except ImportError:
    sys.exit(3)

request = json.load(sys.stdin)
script = jedi.Script(code=request["code"])
items = []
for completion in script.complete(line=request["line"], column=request["column"]):
    items.append(
        {
            "label": completion.name,
            "kind": completion.type,
            "detail": completion.description,
            "documentation": completion.docstring(raw=True) or None,
            "insert_text": completion.name,
        }
    )
json.dump(items, sys.stdout)
"#;

/// Completion engine backed by jedi through a Python subprocess.
pub struct JediCompleter {
    python: String,
}

impl JediCompleter {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }
}

#[async_trait]
impl CompletionEngine for JediCompleter {
    async fn complete(
        &self,
        virtual_text: &str,
        line: u32,
        column: u32,
    ) -> Result<Vec<RawCompletionItem>, CollabError> {
        let request = json!({
            "code": virtual_text,
            "line": line,
            "column": column,
        });
        let args = vec!["-c".to_string(), JEDI_SHIM.to_string()];
        let output = run(&self.python, &args, request.to_string().as_bytes()).await?;

        if output.status.code() == Some(EXIT_NO_JEDI) {
            return Err(CollabError::Unavailable(format!(
                "jedi is not installed for '{}'",
                self.python
            )));
        }
        if !output.status.success() {
            return Err(CollabError::Failed(format!(
                "{}: {}",
                self.python,
                stderr_summary(&output)
            )));
        }

        let stdout = stdout_utf8(&output)?;
        serde_json::from_str(&stdout)
            .map_err(|e| CollabError::Protocol(format!("cannot decode completion output: {e}")))
    }
}
