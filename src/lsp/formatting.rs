//! Formatting support for CGX documents.
//!
//! The formatter collaborator reformats the complete virtual text. Only the
//! script region's lines may flow back to the client: the appended synthetic
//! declaration is stripped, placeholder lines are dropped, and the remainder
//! is spliced over the original script-region lines as a single text edit.

use std::sync::LazyLock;

use regex::Regex;
use tower_lsp::lsp_types::TextEdit;

use crate::document::CgxDocumentState;
use crate::virtualfile::SYNTHETIC_FUNCTION;

/// A placeholder line as emitted by the synthesizer: nothing but `#`.
static PLACEHOLDER_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#+\s*$").unwrap());

/// Extract the formatted script text from a reformatted virtual document.
///
/// Returns `None` when nothing recognizable remains (e.g. the script was
/// formatted away entirely).
fn formatted_script(formatted_virtual: &str) -> Option<String> {
    let mut lines: Vec<&str> = formatted_virtual.split('\n').collect();

    // Drop the synthetic declaration: everything from its header line on.
    let header_prefix = format!("def {SYNTHETIC_FUNCTION}(");
    if let Some(idx) = lines.iter().rposition(|l| l.starts_with(&header_prefix)) {
        lines.truncate(idx);
    }

    // Placeholder comments (and formatter-inserted blanks around them) mark
    // the non-script portion; the script is the run between them.
    let is_filler = |line: &str| PLACEHOLDER_LINE.is_match(line) || line.trim().is_empty();
    let start = lines.iter().position(|l| !is_filler(l))?;
    let end = lines.iter().rposition(|l| !is_filler(l))?;

    Some(lines[start..=end].join("\n"))
}

/// Build the text edit applying a reformatted virtual text to the original
/// document. Returns `None` when there is no script region or the formatted
/// script is identical to the original.
pub fn splice_formatted(state: &CgxDocumentState, formatted_virtual: &str) -> Option<TextEdit> {
    let script = state.script.as_ref()?;
    let new_text = formatted_script(formatted_virtual)?;

    if new_text == script.text {
        return None;
    }

    Some(TextEdit {
        range: script.span.to_range(),
        new_text,
    })
}
