//! Section location for CGX composite documents.
//!
//! A `.cgx` file interleaves a declarative template with one embedded
//! `<script>` block of Python. This module splits the composite text into a
//! script region and a template region with exact line spans, so that the
//! virtual file synthesizer can copy script lines verbatim at their original
//! line numbers.

use std::sync::LazyLock;

use regex::Regex;
use tower_lsp::lsp_types::{Position, Range};

/// A line/column range in original-document coordinates.
///
/// Lines and columns are 0-based; columns count UTF-16 code units, matching
/// the LSP coordinate convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl SourceSpan {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Whole-line span from `start_line` to `end_line` inclusive.
    pub fn lines(start_line: u32, end_line: u32, end_col: u32) -> Self {
        Self::new(start_line, 0, end_line, end_col)
    }

    pub fn contains_line(&self, line: u32) -> bool {
        line >= self.start_line && line <= self.end_line
    }

    pub fn start(&self) -> Position {
        Position::new(self.start_line, self.start_col)
    }

    pub fn end(&self) -> Position {
        Position::new(self.end_line, self.end_col)
    }

    pub fn to_range(&self) -> Range {
        Range::new(
            Position::new(self.start_line, self.start_col),
            Position::new(self.end_line, self.end_col),
        )
    }
}

/// Diagnostic severity as reported by this crate and its collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

/// A diagnostic produced while locating sections or extracting references.
///
/// These are ordinary user-facing diagnostics, not errors: a malformed
/// document never aborts processing of the recoverable remainder.
#[derive(Debug, Clone)]
pub struct SourceDiagnostic {
    pub span: SourceSpan,
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
}

impl SourceDiagnostic {
    pub fn malformed_document(span: SourceSpan, message: impl Into<String>) -> Self {
        Self {
            span,
            severity: Severity::Error,
            code: "malformed-document",
            message: message.into(),
        }
    }

    pub fn malformed_expression(span: SourceSpan, message: impl Into<String>) -> Self {
        Self {
            span,
            severity: Severity::Warning,
            code: "malformed-expression",
            message: message.into(),
        }
    }
}

/// The embedded Python block of a CGX document.
///
/// `text` holds exactly the lines covered by `span`, joined with `\n`;
/// indexing `text` by local line number plus `span.start_line` reproduces
/// the original line number.
#[derive(Debug, Clone)]
pub struct ScriptRegion {
    pub span: SourceSpan,
    pub text: String,
}

/// The markup portion of a CGX document.
#[derive(Debug, Clone)]
pub struct TemplateRegion {
    pub span: SourceSpan,
    pub raw_markup: String,
}

/// Result of splitting a composite document into sections.
#[derive(Debug, Clone, Default)]
pub struct LocatedSections {
    pub script: Option<ScriptRegion>,
    pub template: Option<TemplateRegion>,
    pub diagnostics: Vec<SourceDiagnostic>,
}

static SCRIPT_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<script(\s[^>]*)?>").unwrap());
static SCRIPT_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</script\s*>").unwrap());

/// UTF-16 column of a byte offset within a single line.
fn utf16_col(line: &str, byte_offset: usize) -> u32 {
    line[..byte_offset].chars().map(|c| c.len_utf16() as u32).sum()
}

fn utf16_len(line: &str) -> u32 {
    line.chars().map(|c| c.len_utf16() as u32).sum()
}

/// Span of a regex match on the given line.
fn marker_span(line_no: usize, line: &str, mat: &regex::Match) -> SourceSpan {
    SourceSpan::new(
        line_no as u32,
        utf16_col(line, mat.start()),
        line_no as u32,
        utf16_col(line, mat.end()),
    )
}

/// Split a composite document into its script and template regions.
///
/// At most one script block is supported; a second opening marker, a close
/// marker without an opening, and an unterminated opening each contribute a
/// `malformed-document` diagnostic at the offending marker, and whatever
/// region was recoverable is kept. A document with no script block is not an
/// error: `script` is simply `None`.
pub fn locate(full_text: &str) -> LocatedSections {
    let lines: Vec<&str> = full_text.split('\n').collect();
    let mut sections = LocatedSections::default();

    // (open marker line, span, true when this opening follows a completed block)
    let mut open: Option<(usize, SourceSpan, bool)> = None;
    let mut script_lines: Option<(usize, usize)> = None;
    let mut block_seen = false;

    for (idx, raw_line) in lines.iter().enumerate() {
        let line = raw_line.trim_end_matches('\r');
        let open_mat = SCRIPT_OPEN.find(line);
        let close_mat = SCRIPT_CLOSE.find(line);

        if let (Some(o), Some(c)) = (open_mat, close_mat) {
            if o.start() < c.start() {
                // A block opened and closed on one line has no whole lines
                // to map; it still counts as the document's script block.
                let span = marker_span(idx, line, &o);
                if open.is_some() {
                    sections.diagnostics.push(SourceDiagnostic::malformed_document(
                        span,
                        "nested <script> inside an unterminated script block",
                    ));
                } else if block_seen {
                    sections.diagnostics.push(SourceDiagnostic::malformed_document(
                        span,
                        "only one <script> block is supported per document",
                    ));
                } else {
                    block_seen = true;
                }
                continue;
            }
        }

        if let Some(c) = close_mat {
            let span = marker_span(idx, line, &c);
            match open.take() {
                Some((open_idx, _, extra)) => {
                    if !extra {
                        if idx > open_idx + 1 {
                            script_lines = Some((open_idx + 1, idx - 1));
                        }
                        block_seen = true;
                    }
                }
                None => {
                    sections.diagnostics.push(SourceDiagnostic::malformed_document(
                        span,
                        "closing </script> without a matching <script>",
                    ));
                }
            }
        }

        if let Some(o) = open_mat {
            if close_mat.map_or(true, |c| o.start() > c.start()) {
                let span = marker_span(idx, line, &o);
                if open.is_some() {
                    sections.diagnostics.push(SourceDiagnostic::malformed_document(
                        span,
                        "nested <script> inside an unterminated script block",
                    ));
                } else if block_seen {
                    sections.diagnostics.push(SourceDiagnostic::malformed_document(
                        span,
                        "only one <script> block is supported per document",
                    ));
                    open = Some((idx, span, true));
                } else {
                    open = Some((idx, span, false));
                }
            }
        }
    }

    if let Some((_, span, extra)) = open {
        if !extra {
            sections.diagnostics.push(SourceDiagnostic::malformed_document(
                span,
                "unterminated <script> block",
            ));
        }
    }

    if let Some((start, end)) = script_lines {
        let text = lines[start..=end]
            .iter()
            .map(|l| l.trim_end_matches('\r'))
            .collect::<Vec<_>>()
            .join("\n");
        let end_col = utf16_len(lines[end].trim_end_matches('\r'));
        sections.script = Some(ScriptRegion {
            span: SourceSpan::lines(start as u32, end as u32, end_col),
            text,
        });
    }

    sections.template = pick_template_region(&lines, script_lines);
    sections
}

/// Choose the template region: the contiguous non-script chunk containing a
/// `<template` marker, falling back to the larger chunk.
fn pick_template_region(lines: &[&str], script_lines: Option<(usize, usize)>) -> Option<TemplateRegion> {
    let last = lines.len().saturating_sub(1);

    let chunks: Vec<(usize, usize)> = match script_lines {
        Some((start, end)) => {
            let mut c = Vec::new();
            // Marker lines themselves belong to neither region.
            if start >= 2 {
                c.push((0, start - 2));
            }
            if end + 2 <= last {
                c.push((end + 2, last));
            }
            c
        }
        None => vec![(0, last)],
    };

    let chunk = chunks
        .iter()
        .find(|&&(s, e)| lines[s..=e].iter().any(|l| l.contains("<template")))
        .or_else(|| chunks.iter().max_by_key(|&&(s, e)| e - s))
        .copied()?;

    let (start, end) = chunk;
    let raw_markup = lines[start..=end]
        .iter()
        .map(|l| l.trim_end_matches('\r'))
        .collect::<Vec<_>>()
        .join("\n");
    if raw_markup.trim().is_empty() {
        return None;
    }

    let end_col = utf16_len(lines[end].trim_end_matches('\r'));
    Some(TemplateRegion {
        span: SourceSpan::lines(start as u32, end as u32, end_col),
        raw_markup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "\
<template>
  <label :text=\"message\" />
</template>

<script>
import collagraph as cg

class Counter(cg.Component):
    pass
</script>";

    #[test]
    fn locates_script_and_template() {
        let sections = locate(SIMPLE);
        assert!(sections.diagnostics.is_empty());

        let script = sections.script.expect("script region");
        assert_eq!(script.span.start_line, 5);
        assert_eq!(script.span.end_line, 8);
        assert_eq!(script.text.lines().count(), 4);
        assert!(script.text.starts_with("import collagraph"));
        assert!(script.text.ends_with("    pass"));

        let template = sections.template.expect("template region");
        assert_eq!(template.span.start_line, 0);
        assert_eq!(template.span.end_line, 3);
        assert!(template.raw_markup.contains(":text"));
    }

    #[test]
    fn script_lines_reproduce_original_line_numbers() {
        let sections = locate(SIMPLE);
        let script = sections.script.unwrap();
        let original: Vec<&str> = SIMPLE.split('\n').collect();
        for (local, line) in script.text.split('\n').enumerate() {
            assert_eq!(original[script.span.start_line as usize + local], line);
        }
    }

    #[test]
    fn template_only_document() {
        let sections = locate("<template>\n  <label text=\"hi\" />\n</template>\n");
        assert!(sections.script.is_none());
        assert!(sections.template.is_some());
        assert!(sections.diagnostics.is_empty());
    }

    #[test]
    fn unterminated_script_is_malformed() {
        let sections = locate("<template />\n<script>\nimport os\n");
        assert!(sections.script.is_none());
        let diags = &sections.diagnostics;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "malformed-document");
        assert_eq!(diags[0].span.start_line, 1);
    }

    #[test]
    fn close_without_open_is_malformed() {
        let sections = locate("<template />\n</script>\n");
        assert_eq!(sections.diagnostics.len(), 1);
        assert!(sections.diagnostics[0].message.contains("without a matching"));
    }

    #[test]
    fn second_script_block_is_malformed_and_first_kept() {
        let text = "<script>\na = 1\n</script>\n<script>\nb = 2\n</script>\n";
        let sections = locate(text);
        let script = sections.script.expect("first region kept");
        assert_eq!(script.text, "a = 1");
        assert_eq!(sections.diagnostics.len(), 1);
        assert_eq!(sections.diagnostics[0].span.start_line, 3);
    }

    #[test]
    fn empty_script_block_yields_no_region() {
        let sections = locate("<script>\n</script>\n");
        assert!(sections.script.is_none());
        assert!(sections.diagnostics.is_empty());
    }

    #[test]
    fn inline_block_counts_toward_multiplicity() {
        let sections = locate("<script>x = 1</script>\n<script>\ny = 2\n</script>\n");
        // The inline block has no mappable lines but is still the document's
        // one script block; the second block is flagged.
        assert!(sections.script.is_none());
        assert_eq!(sections.diagnostics.len(), 1);
        assert_eq!(sections.diagnostics[0].span.start_line, 1);
    }

    #[test]
    fn script_first_layout_picks_template_after() {
        let text = "<script>\nx = 1\n</script>\n<template>\n  <label :text=\"x\" />\n</template>";
        let sections = locate(text);
        let template = sections.template.expect("template after script");
        assert_eq!(template.span.start_line, 3);
    }
}
