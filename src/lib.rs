//! CGX Language Server implementation.
//!
//! The server synthesizes a self-contained Python "virtual file" from each
//! open `.cgx` composite document, hands it to external Python tools, and
//! maps every reported position back to original-file coordinates before
//! anything reaches the client.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};

mod collab;
mod document;
mod lsp;
pub mod settings;
mod template;
mod virtualfile;

pub use collab::{
    CollabError, CompletionEngine, Formatter, Linter, RawCompletionItem, RawDiagnostic,
};
pub use document::{
    locate, CgxDocumentState, DocumentStore, LineIndex, LocatedSections, ScriptRegion, Severity,
    SourceDiagnostic, SourceSpan, TemplateRegion,
};
pub use lsp::{
    all_diagnostics, completion_at_position, lint_diagnostics, section_diagnostics,
    splice_formatted,
};
pub use settings::{build_toolset, discover_settings, load_settings, Settings, ToolSet};
pub use template::{extract, ExtractedReferences};
pub use virtualfile::{
    build, synthesize, MappedPosition, PositionMapper, VirtualDocument, SYNTHETIC_FUNCTION,
};

/// One latch per collaborator: an unavailable tool is reported once and then
/// short-circuited until the next document open.
#[derive(Debug, Default)]
struct UnavailableLatches {
    lint: AtomicBool,
    format: AtomicBool,
    complete: AtomicBool,
}

impl UnavailableLatches {
    fn reset(&self) {
        self.lint.store(false, Ordering::Relaxed);
        self.format.store(false, Ordering::Relaxed);
        self.complete.store(false, Ordering::Relaxed);
    }
}

pub struct Backend {
    client: Client,
    documents: Arc<DocumentStore>,
    workspace_root: OnceLock<PathBuf>,
    settings: OnceLock<Arc<Settings>>,
    tools: OnceLock<Arc<ToolSet>>,
    unavailable: Arc<UnavailableLatches>,
}

impl Backend {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            documents: Arc::new(DocumentStore::new()),
            workspace_root: OnceLock::new(),
            settings: OnceLock::new(),
            tools: OnceLock::new(),
            unavailable: Arc::new(UnavailableLatches::default()),
        }
    }

    fn settings(&self) -> Arc<Settings> {
        self.settings
            .get_or_init(|| Arc::new(Settings::default()))
            .clone()
    }

    fn tools(&self) -> Arc<ToolSet> {
        self.tools
            .get_or_init(|| Arc::new(settings::build_toolset(&self.settings())))
            .clone()
    }

    /// Re-derive document state and kick off an independent lint task.
    fn on_document_change(&self, uri: Url, text: String, version: i32) {
        if !is_cgx_file(&uri) {
            return;
        }
        let marker = self.settings().suppress_marker();
        let state = self.documents.open(uri.clone(), text, version, &marker);
        self.spawn_lint(uri, state);
    }

    /// Lint in a separate task so a slow or hung linter never stalls other
    /// requests. The result is dropped unless the document version still
    /// matches at publish time.
    fn spawn_lint(&self, uri: Url, state: Arc<CgxDocumentState>) {
        let client = self.client.clone();
        let documents = Arc::clone(&self.documents);
        let tools = self.tools();
        let unavailable = Arc::clone(&self.unavailable);

        tokio::spawn(async move {
            let lint = if unavailable.lint.load(Ordering::Relaxed) {
                None
            } else {
                match tools.linter.lint(&state.virtual_doc.text).await {
                    Ok(raw) => Some(raw),
                    Err(CollabError::Unavailable(reason)) => {
                        if !unavailable.lint.swap(true, Ordering::Relaxed) {
                            client
                                .log_message(
                                    MessageType::WARNING,
                                    format!("linting disabled: {reason}"),
                                )
                                .await;
                        }
                        None
                    }
                    Err(e) => {
                        tracing::warn!(uri = %uri, error = %e, "lint run failed");
                        None
                    }
                }
            };

            let diagnostics = lsp::all_diagnostics(&state, lint);

            // Serialize stale-check + publish so two generations of
            // diagnostics can never interleave for one document.
            let lock = documents.publish_lock(&uri);
            let _guard = lock.lock().await;
            if documents.current_version(&uri) == Some(state.version) {
                client
                    .publish_diagnostics(uri, diagnostics, Some(state.version))
                    .await;
            }
        });
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            });

        if let Some(root) = workspace_root {
            let (settings, _settings_dir) = settings::discover_settings(&root);
            let _ = self.workspace_root.set(root);
            let _ = self.settings.set(Arc::new(settings));
        }
        let _ = self
            .tools
            .set(Arc::new(settings::build_toolset(&self.settings())));

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![".".to_string()]),
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                document_formatting_provider: Some(OneOf::Left(true)),
                semantic_tokens_provider: Some(
                    SemanticTokensServerCapabilities::SemanticTokensOptions(
                        SemanticTokensOptions {
                            legend: lsp::legend(),
                            full: Some(SemanticTokensFullOptions::Bool(true)),
                            range: None,
                            work_done_progress_options: WorkDoneProgressOptions::default(),
                        },
                    ),
                ),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        if let Some(root) = self.workspace_root.get() {
            tracing::info!(root = %root.display(), "workspace root");
        }
        self.client
            .log_message(MessageType::INFO, "CGX language server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        // Re-opening a document is the explicit retry trigger for tools that
        // went missing earlier.
        self.unavailable.reset();
        self.on_document_change(
            params.text_document.uri,
            params.text_document.text,
            params.text_document.version,
        );
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // We use FULL sync, so there's exactly one change with the full text
        if let Some(change) = params.content_changes.into_iter().next() {
            self.on_document_change(
                params.text_document.uri,
                change.text,
                params.text_document.version,
            );
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Some(state) = self.documents.get(&uri) {
            self.spawn_lint(uri, state);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.documents.close(&params.text_document.uri);
        // Clear diagnostics
        self.client
            .publish_diagnostics(params.text_document.uri, vec![], None)
            .await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = &params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        let Some(state) = self.documents.get(uri) else {
            return Ok(None);
        };
        if self.unavailable.complete.load(Ordering::Relaxed) {
            return Ok(None);
        }

        let tools = self.tools();
        match lsp::completion_at_position(&state, tools.completion.as_ref(), position).await {
            Ok(response) => Ok(response),
            Err(CollabError::Unavailable(reason)) => {
                if !self.unavailable.complete.swap(true, Ordering::Relaxed) {
                    self.client
                        .log_message(
                            MessageType::WARNING,
                            format!("completion disabled: {reason}"),
                        )
                        .await;
                }
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(uri = %uri, error = %e, "completion failed");
                Ok(None)
            }
        }
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        let uri = &params.text_document.uri;

        let Some(state) = self.documents.get(uri) else {
            return Ok(None);
        };
        if state.script.is_none() || self.unavailable.format.load(Ordering::Relaxed) {
            return Ok(None);
        }

        let tools = self.tools();
        match tools.formatter.format(&state.virtual_doc.text).await {
            Ok(formatted) => Ok(lsp::splice_formatted(&state, &formatted).map(|edit| vec![edit])),
            Err(CollabError::Unavailable(reason)) => {
                if !self.unavailable.format.swap(true, Ordering::Relaxed) {
                    self.client
                        .log_message(
                            MessageType::WARNING,
                            format!("formatting disabled: {reason}"),
                        )
                        .await;
                }
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(uri = %uri, error = %e, "formatting failed");
                Ok(None)
            }
        }
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> Result<Option<SemanticTokensResult>> {
        let uri = &params.text_document.uri;

        let Some(state) = self.documents.get(uri) else {
            return Ok(None);
        };

        Ok(Some(SemanticTokensResult::Tokens(SemanticTokens {
            result_id: None,
            data: lsp::tokens_for_document(&state),
        })))
    }
}

/// Check if a URI refers to a .cgx file.
fn is_cgx_file(uri: &Url) -> bool {
    uri.path().ends_with(".cgx")
}

pub fn create_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::new(Backend::new)
}
