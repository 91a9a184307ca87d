//! Bidirectional position mapping between virtual and original coordinates.
//!
//! The synthesizer preserves line numbers for every original line, so line
//! mapping is the identity; the interesting work is classifying positions
//! that fall inside the appended synthetic declaration and clamping columns
//! that external tools report one past end-of-line.
//!
//! A mapper has no independent lifecycle: it is derived on demand from a
//! document's current state and discarded with it.

use tower_lsp::lsp_types::Position;

use crate::collab::RawDiagnostic;
use crate::document::{LineIndex, SourceSpan};

use super::synthesize::VirtualDocument;

/// Result of mapping a virtual position back to the original document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappedPosition {
    Original(Position),
    /// The position lies inside the appended declaration; nothing located
    /// there may ever be published.
    Synthetic,
}

/// Maps positions between the composite document and its virtual file.
pub struct PositionMapper<'a> {
    script_span: Option<&'a SourceSpan>,
    synthetic_start: u32,
    /// Line index of the *original* composite text, for column clamping.
    line_index: &'a LineIndex,
}

impl<'a> PositionMapper<'a> {
    pub fn new(
        script_span: Option<&'a SourceSpan>,
        virtual_doc: &VirtualDocument,
        line_index: &'a LineIndex,
    ) -> Self {
        Self {
            script_span,
            synthetic_start: virtual_doc.synthetic_span.start_line,
            line_index,
        }
    }

    /// Map a virtual position to the original document, or to the
    /// `Synthetic` sentinel when it falls inside the appended declaration.
    /// Line mapping is the identity by construction.
    pub fn to_original(&self, position: Position) -> MappedPosition {
        if position.line >= self.synthetic_start {
            return MappedPosition::Synthetic;
        }
        MappedPosition::Original(self.clamp(position))
    }

    /// Map an original cursor position into the virtual file. Identity
    /// inside the script region; `None` elsewhere (placeholder lines carry
    /// no meaningful columns).
    pub fn to_virtual(&self, position: Position) -> Option<Position> {
        let span = self.script_span?;
        span.contains_line(position.line).then_some(position)
    }

    /// Drop diagnostics anchored in the synthetic region and translate the
    /// rest to original coordinates, clamping columns that run past the
    /// original line's end.
    pub fn filter_and_translate(&self, diagnostics: Vec<RawDiagnostic>) -> Vec<RawDiagnostic> {
        diagnostics
            .into_iter()
            .filter_map(|diagnostic| {
                let start = match self.to_original(diagnostic.span.start()) {
                    MappedPosition::Original(p) => p,
                    MappedPosition::Synthetic => return None,
                };
                // An end inside the synthetic region collapses to the start
                // line's end; otherwise only the column is clamped.
                let end = match self.to_original(diagnostic.span.end()) {
                    MappedPosition::Original(p) => p,
                    MappedPosition::Synthetic => self.line_end(start.line),
                };
                Some(RawDiagnostic {
                    span: SourceSpan::new(start.line, start.character, end.line, end.character),
                    ..diagnostic
                })
            })
            .collect()
    }

    fn clamp(&self, position: Position) -> Position {
        let line_len = self
            .line_index
            .line_utf16_len(position.line as usize)
            .unwrap_or(0);
        Position::new(position.line, position.character.min(line_len))
    }

    fn line_end(&self, line: u32) -> Position {
        Position::new(line, self.line_index.line_utf16_len(line as usize).unwrap_or(0))
    }
}
