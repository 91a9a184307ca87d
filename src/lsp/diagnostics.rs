//! Diagnostics conversion to LSP types.
//!
//! Two sources feed the published list: diagnostics produced while locating
//! sections / extracting references (already in original coordinates), and
//! linter output in virtual coordinates, which is filtered and translated by
//! the position mapper before conversion.

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString};

use crate::collab::RawDiagnostic;
use crate::document::{CgxDocumentState, Severity, SourceDiagnostic};

fn severity_to_lsp(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Info => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    }
}

/// Convert section/extraction diagnostics to LSP diagnostics.
pub fn section_diagnostics(diagnostics: &[SourceDiagnostic]) -> Vec<Diagnostic> {
    diagnostics
        .iter()
        .map(|d| Diagnostic {
            range: d.span.to_range(),
            severity: Some(severity_to_lsp(d.severity)),
            code: Some(NumberOrString::String(d.code.to_string())),
            code_description: None,
            source: Some("cgx".to_string()),
            message: d.message.clone(),
            related_information: None,
            tags: None,
            data: None,
        })
        .collect()
}

/// Filter and translate linter output, then convert to LSP diagnostics.
///
/// Diagnostics anchored in the synthetic region never survive this call.
pub fn lint_diagnostics(state: &CgxDocumentState, raw: Vec<RawDiagnostic>) -> Vec<Diagnostic> {
    state
        .mapper()
        .filter_and_translate(raw)
        .into_iter()
        .map(|d| Diagnostic {
            range: d.span.to_range(),
            severity: Some(severity_to_lsp(d.severity)),
            code: d.code.map(NumberOrString::String),
            code_description: None,
            source: Some("ruff".to_string()),
            message: d.message,
            related_information: None,
            tags: None,
            data: None,
        })
        .collect()
}

/// The complete diagnostic list for a document: section diagnostics plus
/// whatever the linter reported (None when the linter was unavailable).
pub fn all_diagnostics(
    state: &CgxDocumentState,
    lint: Option<Vec<RawDiagnostic>>,
) -> Vec<Diagnostic> {
    let mut diagnostics = section_diagnostics(&state.section_diagnostics);
    if let Some(raw) = lint {
        diagnostics.extend(lint_diagnostics(state, raw));
    }
    diagnostics
}
