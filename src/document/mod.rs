//! Document state management and text utilities.
//!
//! This module provides:
//! - `LineIndex` for byte offset <-> LSP position conversion
//! - the section locator splitting composite text into script and template
//!   regions with exact spans
//! - `CgxDocumentState` and `DocumentStore` for document lifecycle management

mod region;
mod state;
mod text;

pub use region::{
    locate, LocatedSections, ScriptRegion, Severity, SourceDiagnostic, SourceSpan, TemplateRegion,
};
pub use state::{CgxDocumentState, DocumentStore};
pub use text::LineIndex;
