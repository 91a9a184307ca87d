//! LSP protocol feature implementations.
//!
//! This module provides implementations for LSP features:
//! - Diagnostics conversion and synthetic-region filtering
//! - Completion through the external engine
//! - Formatting re-splicing over the script region
//! - Semantic tokens for template markup

mod completion;
mod diagnostics;
mod formatting;
mod semantic_tokens;

pub use completion::completion_at_position;
pub use diagnostics::{all_diagnostics, lint_diagnostics, section_diagnostics};
pub use formatting::splice_formatted;
pub use semantic_tokens::{legend, tokens_for_document};
