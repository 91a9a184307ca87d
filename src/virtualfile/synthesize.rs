//! Virtual file synthesis.
//!
//! Builds the self-contained Python text handed to external tools. Script
//! lines are copied verbatim at their original line numbers; every other
//! original line becomes a same-length full-line comment, so line N of the
//! virtual text always corresponds to line N of the composite document. The
//! synthetic declaration carrying the template's identifier references is
//! appended after the last original line and its line range recorded for
//! later filtering.

use crate::document::{ScriptRegion, SourceSpan};

/// Reserved name of the appended declaration. Also used to find and strip
/// the declaration in reformatted virtual text.
pub const SYNTHETIC_FUNCTION: &str = "__cgx_template_refs__";

/// The synthesized Python document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDocument {
    pub text: String,
    pub line_count: u32,
    /// Line range of the appended declaration, in virtual coordinates.
    pub synthetic_span: SourceSpan,
}

/// Compose the virtual text for a composite document.
///
/// `suppress_marker` is appended to the declaration header so the external
/// linter's naming/docstring style rules do not fire on generated code; it is
/// a configuration constant, not a protocol detail.
///
/// Synthesis is deterministic: identical inputs yield byte-identical output.
pub fn synthesize(
    source: &str,
    script: Option<&ScriptRegion>,
    body: &str,
    suppress_marker: &str,
) -> VirtualDocument {
    let source_lines: Vec<&str> = source.split('\n').collect();
    let mut lines: Vec<String> = Vec::with_capacity(source_lines.len() + 2);

    for (idx, raw_line) in source_lines.iter().enumerate() {
        let in_script = script
            .map(|s| s.span.contains_line(idx as u32))
            .unwrap_or(false);
        if in_script {
            lines.push((*raw_line).to_string());
        } else {
            lines.push(placeholder_for(raw_line));
        }
    }

    let synthetic_start = lines.len() as u32;
    let header = format!("def {SYNTHETIC_FUNCTION}():{suppress_marker}");
    let last_body_line_len = body
        .split('\n')
        .next_back()
        .map(|l| l.chars().map(|c| c.len_utf16() as u32).sum())
        .unwrap_or(0);
    lines.push(header);
    lines.extend(body.split('\n').map(str::to_string));

    let line_count = lines.len() as u32;
    let synthetic_span = SourceSpan::lines(synthetic_start, line_count - 1, last_body_line_len);

    let mut text = lines.join("\n");
    text.push('\n');

    VirtualDocument {
        text,
        line_count,
        synthetic_span,
    }
}

/// A full-line comment matching the original line's byte length, so tools
/// that count columns per line still work. Empty lines still get one `#`.
fn placeholder_for(line: &str) -> String {
    let len = line.trim_end_matches('\r').len().max(1);
    "#".repeat(len)
}
