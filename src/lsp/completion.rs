//! Completion support for CGX documents.
//!
//! Completions are only offered inside the script region. The cursor
//! position is mapped to virtual coordinates (identity inside the region),
//! the completion collaborator runs against the full virtual text so it sees
//! the script's imports and classes, and its candidates are converted to LSP
//! items.

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionResponse, Position,
};

use crate::collab::{CollabError, CompletionEngine, RawCompletionItem};
use crate::document::CgxDocumentState;

/// Map the completion engine's type string to an LSP item kind.
fn kind_to_lsp(kind: &str) -> CompletionItemKind {
    match kind {
        "module" => CompletionItemKind::MODULE,
        "class" => CompletionItemKind::CLASS,
        "function" => CompletionItemKind::FUNCTION,
        "param" => CompletionItemKind::VARIABLE,
        "path" => CompletionItemKind::FILE,
        "keyword" => CompletionItemKind::KEYWORD,
        "property" => CompletionItemKind::PROPERTY,
        "statement" => CompletionItemKind::VARIABLE,
        _ => CompletionItemKind::TEXT,
    }
}

fn to_item(raw: RawCompletionItem) -> CompletionItem {
    CompletionItem {
        label: raw.label.clone(),
        kind: Some(kind_to_lsp(&raw.kind)),
        detail: raw.detail,
        documentation: raw
            .documentation
            .map(tower_lsp::lsp_types::Documentation::String),
        sort_text: Some(raw.label),
        insert_text: Some(raw.insert_text),
        ..CompletionItem::default()
    }
}

/// Run completion at an original-coordinate cursor position.
///
/// Returns `Ok(None)` when the cursor is outside the script region; the
/// template side has no completion support.
pub async fn completion_at_position(
    state: &CgxDocumentState,
    engine: &dyn CompletionEngine,
    position: Position,
) -> Result<Option<CompletionResponse>, CollabError> {
    let Some(virtual_pos) = state.mapper().to_virtual(position) else {
        return Ok(None);
    };

    // The engine follows jedi's convention: 1-based lines, 0-based columns.
    let items = engine
        .complete(
            &state.virtual_doc.text,
            virtual_pos.line + 1,
            virtual_pos.character,
        )
        .await?;

    if items.is_empty() {
        return Ok(None);
    }
    Ok(Some(CompletionResponse::Array(
        items.into_iter().map(to_item).collect(),
    )))
}
