//! Reference extraction from template markup.
//!
//! Collects the script-level names a template uses so the virtual file can
//! make them visible to the external linter. Extraction is lexical, not
//! semantic: each expression-valued attribute is tokenized with a
//! conservative subset of Python's expression grammar and the leftmost
//! identifier of every dotted or called chain is kept (`self.message`
//! contributes `self`; `on_click()` contributes `on_click`). The result
//! over-approximates real usage, which is the safe direction: no legitimately
//! used script name may be reported unused.

use std::collections::BTreeSet;

use crate::document::{LineIndex, SourceDiagnostic, SourceSpan, TemplateRegion};

use super::markup::{self, AttrKind, Attribute, Element, MarkupVisitor};

/// Names referenced by a template, plus any non-fatal expression diagnostics.
#[derive(Debug, Default)]
pub struct ExtractedReferences {
    pub names: BTreeSet<String>,
    pub diagnostics: Vec<SourceDiagnostic>,
}

/// Python keywords and literal keywords; never identifiers.
const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield", "True",
    "False", "None",
];

/// Extract all identifier references from a template region.
///
/// A malformed expression contributes no names and exactly one diagnostic at
/// its attribute value's span; the rest of the template is still processed.
pub fn extract(template: &TemplateRegion) -> ExtractedReferences {
    let nodes = markup::parse(&template.raw_markup);
    let mut collector = RefCollector {
        index: LineIndex::new(template.raw_markup.clone()),
        base_line: template.span.start_line,
        refs: ExtractedReferences::default(),
    };
    markup::walk(&nodes, &mut collector);
    collector.refs
}

struct RefCollector {
    index: LineIndex,
    base_line: u32,
    refs: ExtractedReferences,
}

impl RefCollector {
    /// Convert a byte range in the markup to original-document coordinates.
    fn source_span(&self, range: &std::ops::Range<usize>) -> SourceSpan {
        let start = self.index.offset_to_position(range.start);
        let end = self.index.offset_to_position(range.end);
        SourceSpan::new(
            self.base_line + start.line,
            start.character,
            self.base_line + end.line,
            end.character,
        )
    }

    fn collect_expression(&mut self, value: &str, value_span: &std::ops::Range<usize>) {
        match scan_identifiers(value) {
            Ok(names) => self.refs.names.extend(names),
            Err(problem) => {
                let span = self.source_span(value_span);
                self.refs.diagnostics.push(SourceDiagnostic::malformed_expression(
                    span,
                    format!("cannot parse template expression: {problem}"),
                ));
            }
        }
    }
}

impl MarkupVisitor for RefCollector {
    fn visit_attribute(&mut self, _element: &Element, attribute: &Attribute) {
        let (Some(value), Some(value_span)) = (&attribute.value, &attribute.value_span) else {
            return;
        };

        match attribute.kind {
            AttrKind::Static => {}
            AttrKind::Expression | AttrKind::EventHandler => {
                self.collect_expression(value, value_span);
            }
            AttrKind::For => {
                // Only the iterable side references script names; the loop
                // bindings on the left of `in` are template-local.
                match value.split_once(" in ") {
                    Some((_, iterable)) => self.collect_expression(iterable, value_span),
                    None => {
                        let span = self.source_span(value_span);
                        self.refs.diagnostics.push(SourceDiagnostic::malformed_expression(
                            span,
                            "v-for must have the form 'item in iterable'",
                        ));
                    }
                }
            }
        }
    }
}

/// Lexically scan a Python expression and return the referenced identifiers.
///
/// Returns an error message for text the scanner cannot tokenize; such an
/// expression contributes nothing.
fn scan_identifiers(expr: &str) -> Result<Vec<String>, &'static str> {
    let bytes = expr.as_bytes();
    let mut names = Vec::new();
    let mut brackets: Vec<u8> = Vec::new();
    let mut prev_significant: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' | b'\'' => {
                i = skip_string(bytes, i).ok_or("unterminated string literal")?;
                prev_significant = Some(b'"');
            }
            b'(' | b'[' | b'{' => {
                brackets.push(b);
                prev_significant = Some(b);
                i += 1;
            }
            b')' | b']' | b'}' => {
                let expected = match b {
                    b')' => b'(',
                    b']' => b'[',
                    _ => b'{',
                };
                if brackets.pop() != Some(expected) {
                    return Err("unbalanced brackets");
                }
                prev_significant = Some(b);
                i += 1;
            }
            _ if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let word = &expr[start..i];
                if prev_significant != Some(b'.') && !KEYWORDS.contains(&word) {
                    names.push(word.to_string());
                }
                prev_significant = Some(b'a');
            }
            _ if b.is_ascii_digit() => {
                // Numbers, including dotted/exponent/hex forms.
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'_')
                {
                    i += 1;
                }
                prev_significant = Some(b'0');
            }
            _ if b.is_ascii_whitespace() => {
                i += 1;
            }
            _ => {
                prev_significant = Some(b);
                i += 1;
            }
        }
    }

    if !brackets.is_empty() {
        return Err("unbalanced brackets");
    }
    Ok(names)
}

/// Skip a quoted string starting at `start`; returns the index just past the
/// closing quote, or None when unterminated. Backslash escapes are honored.
fn skip_string(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}
