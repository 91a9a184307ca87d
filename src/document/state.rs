//! Document state management for the CGX LSP.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tower_lsp::lsp_types::Url;

use crate::template::extract;
use crate::virtualfile::{build, synthesize, PositionMapper, VirtualDocument};

use super::region::{locate, ScriptRegion, SourceDiagnostic, TemplateRegion};
use super::text::LineIndex;

/// Derived state for a single open CGX document.
///
/// Everything here is a pure function of the composite text and is
/// recomputed wholesale on every edit; nothing is patched in place.
#[derive(Debug)]
pub struct CgxDocumentState {
    /// Pre-computed line index over the original composite text.
    pub line_index: LineIndex,
    /// The embedded Python block, if any.
    pub script: Option<ScriptRegion>,
    /// The markup portion, if any.
    pub template: Option<TemplateRegion>,
    /// Identifier names the template references.
    pub references: BTreeSet<String>,
    /// Malformed-document and malformed-expression diagnostics found while
    /// locating sections and extracting references.
    pub section_diagnostics: Vec<SourceDiagnostic>,
    /// The synthesized virtual Python text handed to external tools.
    pub virtual_doc: VirtualDocument,
    /// Document version from the client; results computed against an older
    /// version are never published.
    pub version: i32,
}

impl CgxDocumentState {
    /// Build the full derived state for a composite document.
    pub fn new(source: String, version: i32, suppress_marker: &str) -> Self {
        let sections = locate(&source);
        let mut section_diagnostics = sections.diagnostics;

        let (references, expr_diagnostics) = match &sections.template {
            Some(template) => {
                let extracted = extract(template);
                (extracted.names, extracted.diagnostics)
            }
            None => (BTreeSet::new(), Vec::new()),
        };
        section_diagnostics.extend(expr_diagnostics);

        let body = build(&references);
        let virtual_doc = synthesize(&source, sections.script.as_ref(), &body, suppress_marker);

        Self {
            line_index: LineIndex::new(source),
            script: sections.script,
            template: sections.template,
            references,
            section_diagnostics,
            virtual_doc,
            version,
        }
    }

    /// The original composite text.
    pub fn source(&self) -> &str {
        self.line_index.source()
    }

    /// Position mapper for this state's virtual document.
    pub fn mapper(&self) -> PositionMapper<'_> {
        PositionMapper::new(
            self.script.as_ref().map(|s| &s.span),
            &self.virtual_doc,
            &self.line_index,
        )
    }
}

/// Thread-safe storage for open documents.
///
/// Each document's derived state is independent; there is no lock shared
/// across documents. The per-document publish lock serializes diagnostic
/// publication so two generations can never interleave.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<Url, Arc<CgxDocumentState>>,
    publish_locks: DashMap<Url, Arc<Mutex<()>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or replace a document, synchronously recomputing all derived
    /// state.
    pub fn open(
        &self,
        uri: Url,
        source: String,
        version: i32,
        suppress_marker: &str,
    ) -> Arc<CgxDocumentState> {
        let state = Arc::new(CgxDocumentState::new(source, version, suppress_marker));
        self.documents.insert(uri, Arc::clone(&state));
        state
    }

    /// Close a document and drop its state.
    pub fn close(&self, uri: &Url) {
        self.documents.remove(uri);
        self.publish_locks.remove(uri);
    }

    /// Get a document's current state.
    pub fn get(&self, uri: &Url) -> Option<Arc<CgxDocumentState>> {
        self.documents.get(uri).map(|r| Arc::clone(&r))
    }

    /// Version of the document's current state, if open.
    pub fn current_version(&self, uri: &Url) -> Option<i32> {
        self.documents.get(uri).map(|r| r.version)
    }

    /// Per-document lock held across the stale-check + publish sequence.
    pub fn publish_lock(&self, uri: &Url) -> Arc<Mutex<()>> {
        Arc::clone(
            self.publish_locks
                .entry(uri.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }
}
