//! Semantic tokens for CGX template markup.
//!
//! Highlights the template side of a composite document: element names,
//! attribute names, directive and event attributes, identifiers and string
//! literals inside expression values, and comments. The script side is left
//! to the client's Python grammar.

use tower_lsp::lsp_types::{
    SemanticToken, SemanticTokenType, SemanticTokensLegend,
};

use crate::document::{CgxDocumentState, LineIndex};
use crate::template::markup::{self, AttrKind, Attribute, Comment, Element, MarkupVisitor};

/// Token type indices (must match LEGEND order).
pub mod token_types {
    pub const CLASS: u32 = 0;
    pub const PROPERTY: u32 = 1;
    pub const KEYWORD: u32 = 2;
    pub const VARIABLE: u32 = 3;
    pub const STRING: u32 = 4;
    pub const COMMENT: u32 = 5;
    pub const FUNCTION: u32 = 6;
}

/// Get the semantic tokens legend for capability declaration.
pub fn legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: vec![
            SemanticTokenType::CLASS,
            SemanticTokenType::PROPERTY,
            SemanticTokenType::KEYWORD,
            SemanticTokenType::VARIABLE,
            SemanticTokenType::STRING,
            SemanticTokenType::COMMENT,
            SemanticTokenType::FUNCTION,
        ],
        token_modifiers: vec![],
    }
}

/// A raw token before delta encoding: byte offset into the markup text.
#[derive(Debug, Clone, Copy)]
struct RawToken {
    start: usize,
    length: usize,
    token_type: u32,
}

struct TokenCollector {
    tokens: Vec<RawToken>,
}

impl TokenCollector {
    fn push(&mut self, start: usize, end: usize, token_type: u32) {
        if start < end {
            self.tokens.push(RawToken {
                start,
                length: end - start,
                token_type,
            });
        }
    }

    /// Tokenize an attribute value as a Python expression: identifiers and
    /// string literals only, everything else left unhighlighted.
    fn push_expression(&mut self, value: &str, value_start: usize, ident_type: u32) {
        let bytes = value.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if b == b'"' || b == b'\'' {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i] != b {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
                self.push(value_start + start, value_start + i, token_types::STRING);
            } else if b.is_ascii_alphabetic() || b == b'_' {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                self.push(value_start + start, value_start + i, ident_type);
            } else {
                i += 1;
            }
        }
    }
}

impl MarkupVisitor for TokenCollector {
    fn visit_element(&mut self, element: &Element) {
        self.push(
            element.name_span.start,
            element.name_span.end,
            token_types::CLASS,
        );
    }

    fn visit_attribute(&mut self, _element: &Element, attribute: &Attribute) {
        let name_type = match attribute.kind {
            AttrKind::Static => token_types::PROPERTY,
            _ => token_types::KEYWORD,
        };
        self.push(attribute.name_span.start, attribute.name_span.end, name_type);

        let (Some(value), Some(value_span)) = (&attribute.value, &attribute.value_span) else {
            return;
        };
        match attribute.kind {
            AttrKind::Static => {
                self.push(value_span.start, value_span.end, token_types::STRING);
            }
            AttrKind::EventHandler => {
                self.push_expression(value, value_span.start, token_types::FUNCTION);
            }
            AttrKind::Expression | AttrKind::For => {
                self.push_expression(value, value_span.start, token_types::VARIABLE);
            }
        }
    }

    fn visit_comment(&mut self, comment: &Comment) {
        self.push(comment.span.start, comment.span.end, token_types::COMMENT);
    }
}

/// Compute delta-encoded semantic tokens for a document's template region.
pub fn tokens_for_document(state: &CgxDocumentState) -> Vec<SemanticToken> {
    let Some(template) = &state.template else {
        return Vec::new();
    };

    let nodes = markup::parse(&template.raw_markup);
    let mut collector = TokenCollector { tokens: Vec::new() };
    markup::walk(&nodes, &mut collector);

    encode(
        collector.tokens,
        &LineIndex::new(template.raw_markup.clone()),
        template.span.start_line,
    )
}

/// Sort tokens by position and delta-encode per the LSP wire format.
///
/// Multi-line tokens (comments) are truncated at their first line end; the
/// protocol cannot express them without capability negotiation.
fn encode(mut tokens: Vec<RawToken>, index: &LineIndex, base_line: u32) -> Vec<SemanticToken> {
    tokens.sort_by_key(|t| t.start);

    let mut encoded = Vec::with_capacity(tokens.len());
    let mut prev_line = 0u32;
    let mut prev_col = 0u32;

    for token in tokens {
        let start = index.offset_to_position(token.start);
        let end = index.offset_to_position(token.start + token.length);
        let length = if end.line == start.line {
            end.character - start.character
        } else {
            index.line_utf16_len(start.line as usize).unwrap_or(0) - start.character
        };
        if length == 0 {
            continue;
        }

        let line = base_line + start.line;
        let delta_line = line - prev_line;
        let delta_start = if delta_line == 0 {
            start.character - prev_col
        } else {
            start.character
        };

        encoded.push(SemanticToken {
            delta_line,
            delta_start,
            length,
            token_type: token.token_type,
            token_modifiers_bitset: 0,
        });
        prev_line = line;
        prev_col = start.character;
    }

    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
<template>
  <label :text=\"self.message\" text=\"plain\" />
  <!-- note -->
</template>
<script>
pass
</script>
";

    fn decode(tokens: &[SemanticToken]) -> Vec<(u32, u32, u32, u32)> {
        let mut out = Vec::new();
        let mut line = 0u32;
        let mut col = 0u32;
        for t in tokens {
            line += t.delta_line;
            if t.delta_line > 0 {
                col = 0;
            }
            col += t.delta_start;
            out.push((line, col, t.length, t.token_type));
        }
        out
    }

    #[test]
    fn template_markup_produces_tokens() {
        let state = CgxDocumentState::new(DOC.to_string(), 0, "  # noqa");
        let tokens = tokens_for_document(&state);
        let decoded = decode(&tokens);

        // "template" element name on line 0.
        assert!(decoded.contains(&(0, 1, 8, token_types::CLASS)));
        // ":text" directive name on line 1, col 9.
        assert!(decoded.contains(&(1, 9, 5, token_types::KEYWORD)));
        // "self" identifier inside the expression value.
        assert!(decoded.contains(&(1, 16, 4, token_types::VARIABLE)));
        // static attribute name and value.
        assert!(decoded.contains(&(1, 30, 4, token_types::PROPERTY)));
        assert!(decoded.contains(&(1, 36, 5, token_types::STRING)));
        // comment line.
        assert!(decoded.contains(&(2, 2, 13, token_types::COMMENT)));
    }

    #[test]
    fn script_only_document_has_no_tokens() {
        let state =
            CgxDocumentState::new("<script>\npass\n</script>\n".to_string(), 0, "  # noqa");
        assert!(tokens_for_document(&state).is_empty());
    }

    #[test]
    fn deltas_are_relative() {
        let state = CgxDocumentState::new(DOC.to_string(), 0, "  # noqa");
        let tokens = tokens_for_document(&state);
        assert!(!tokens.is_empty());
        assert_eq!(tokens[0].delta_line, 0);
        // Every later token on the same line encodes a positive column delta.
        for pair in tokens.windows(2) {
            if pair[1].delta_line == 0 {
                assert!(pair[1].delta_start > 0);
            }
        }
    }
}
