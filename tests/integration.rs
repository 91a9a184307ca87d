use cgxlsp::{
    all_diagnostics, splice_formatted, CgxDocumentState, CollabError, CompletionEngine,
    DocumentStore, MappedPosition, RawCompletionItem, RawDiagnostic, Severity, SourceSpan,
};
use expect_test::expect;
use tower_lsp::async_trait;
use tower_lsp::lsp_types::{CompletionItemKind, CompletionResponse, Diagnostic, Position, Url};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const MARKER: &str = "  # noqa";

/// A small but complete component: template references (`self`, `bump`),
/// imports, and a class body.
const COUNTER: &str = "\
<template>
  <widget>
    <label :text=\"self.message\" />
    <button text=\"bump\" @clicked=\"bump\" />
  </widget>
</template>

<script>
import collagraph as cg


class Counter(cg.Component):
    def bump(self, event):
        self.state[\"count\"] += 1
</script>
";

fn state(source: &str) -> CgxDocumentState {
    CgxDocumentState::new(source.to_string(), 0, MARKER)
}

/// Format diagnostics into a deterministic, human-readable string.
///
/// Each diagnostic becomes one line:
///   <start_line>:<start_col>-<end_line>:<end_col> <severity> [<code>]: <message>
fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return "OK (no diagnostics)".to_string();
    }

    let mut lines: Vec<String> = diagnostics
        .iter()
        .map(|d| {
            let range = &d.range;
            let severity = match d.severity {
                Some(tower_lsp::lsp_types::DiagnosticSeverity::ERROR) => "error",
                Some(tower_lsp::lsp_types::DiagnosticSeverity::WARNING) => "warning",
                Some(tower_lsp::lsp_types::DiagnosticSeverity::INFORMATION) => "info",
                Some(tower_lsp::lsp_types::DiagnosticSeverity::HINT) => "hint",
                _ => "unknown",
            };
            let code = match &d.code {
                Some(tower_lsp::lsp_types::NumberOrString::String(s)) => format!(" [{}]", s),
                Some(tower_lsp::lsp_types::NumberOrString::Number(n)) => format!(" [{}]", n),
                None => String::new(),
            };
            format!(
                "{}:{}-{}:{} {}{}: {}",
                range.start.line,
                range.start.character,
                range.end.line,
                range.end.character,
                severity,
                code,
                d.message,
            )
        })
        .collect();

    lines.sort();
    lines.join("\n")
}

fn raw(span: SourceSpan, severity: Severity, code: Option<&str>, message: &str) -> RawDiagnostic {
    RawDiagnostic {
        span,
        severity,
        code: code.map(str::to_string),
        message: message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests — virtual file synthesis
// ---------------------------------------------------------------------------

#[test]
fn script_lines_survive_byte_identical() {
    let st = state(COUNTER);
    let script = st.script.as_ref().expect("script region");
    let original: Vec<&str> = COUNTER.split('\n').collect();
    let virtual_lines: Vec<&str> = st.virtual_doc.text.split('\n').collect();

    for line in script.span.start_line..=script.span.end_line {
        assert_eq!(virtual_lines[line as usize], original[line as usize]);
    }
}

#[test]
fn placeholders_preserve_line_lengths() {
    let st = state(COUNTER);
    let script = st.script.as_ref().unwrap();
    let original: Vec<&str> = COUNTER.split('\n').collect();
    let virtual_lines: Vec<&str> = st.virtual_doc.text.split('\n').collect();

    for (idx, line) in original.iter().enumerate() {
        if script.span.contains_line(idx as u32) {
            continue;
        }
        let placeholder = virtual_lines[idx];
        assert!(placeholder.chars().all(|c| c == '#'));
        assert_eq!(placeholder.len(), line.len().max(1));
    }
}

#[test]
fn synthetic_declaration_lists_references() {
    let st = state(COUNTER);
    let start = st.virtual_doc.synthetic_span.start_line as usize;
    let tail: Vec<&str> = st.virtual_doc.text.split('\n').collect::<Vec<_>>()[start..].to_vec();
    let actual = tail.join("\n");
    let expected = expect![[r#"
        def __cgx_template_refs__():  # noqa
            bump
            self
    "#]];
    expected.assert_eq(&format!("{}\n", actual.trim_end_matches('\n')));
}

#[test]
fn virtual_line_count_is_original_plus_declaration() {
    let st = state(COUNTER);
    let original_count = COUNTER.split('\n').count() as u32;
    // Declaration header plus one statement per referenced name.
    let synthetic_lines = 1 + st.references.len() as u32;
    assert_eq!(st.virtual_doc.line_count, original_count + synthetic_lines);
}

#[test]
fn synthesis_is_deterministic() {
    let a = state(COUNTER);
    let b = state(COUNTER);
    assert_eq!(a.virtual_doc.text, b.virtual_doc.text);
    assert_eq!(a.virtual_doc.synthetic_span, b.virtual_doc.synthetic_span);
}

#[test]
fn template_only_usage_appears_in_virtual_file() {
    let source = "\
<template>
  <row v-for=\"item in rows\" :data=\"item\" />
</template>
<script>
from data import rows
</script>
";
    let st = state(source);
    // `rows` is imported but used only by the template; the synthetic body
    // must reference it so the linter counts a use.
    assert!(st.virtual_doc.text.contains("\n    rows"));

    let unused = "\
<template>
  <label text=\"static\" />
</template>
<script>
from data import rows
</script>
";
    let st = state(unused);
    // Nothing references `rows` here; the linter must stay free to flag it.
    assert!(!st.virtual_doc.text.contains("\n    rows"));
}

// ---------------------------------------------------------------------------
// Tests — position mapping
// ---------------------------------------------------------------------------

#[test]
fn script_positions_round_trip() {
    let st = state(COUNTER);
    let mapper = st.mapper();
    let script = st.script.as_ref().unwrap();

    for line in script.span.start_line..=script.span.end_line {
        let p = Position::new(line, 0);
        let v = mapper.to_virtual(p).expect("inside script");
        assert_eq!(mapper.to_original(v), MappedPosition::Original(p));
    }

    // A mid-line position survives unchanged as well.
    let p = Position::new(13, 12);
    let v = mapper.to_virtual(p).unwrap();
    assert_eq!(mapper.to_original(v), MappedPosition::Original(p));
}

#[test]
fn synthetic_positions_are_sentinel() {
    let st = state(COUNTER);
    let mapper = st.mapper();
    let start = st.virtual_doc.synthetic_span.start_line;
    for line in start..st.virtual_doc.line_count {
        assert_eq!(
            mapper.to_original(Position::new(line, 0)),
            MappedPosition::Synthetic
        );
    }
}

// ---------------------------------------------------------------------------
// Tests — diagnostics pipeline
// ---------------------------------------------------------------------------

#[test]
fn lint_results_are_translated_filtered_and_clamped() {
    let st = state(COUNTER);
    let synthetic_line = st.virtual_doc.synthetic_span.start_line;

    let lint = vec![
        // Inside the script region, translated as-is.
        raw(
            SourceSpan::new(8, 7, 8, 23),
            Severity::Warning,
            Some("F401"),
            "'collagraph' imported but unused",
        ),
        // One-past-end column, clamped to the line's end.
        raw(
            SourceSpan::new(13, 0, 13, 40),
            Severity::Error,
            None,
            "invalid syntax",
        ),
        // Anchored in the synthetic declaration, dropped before publishing.
        raw(
            SourceSpan::new(synthetic_line + 1, 4, synthetic_line + 1, 8),
            Severity::Error,
            Some("F821"),
            "undefined name 'bump'",
        ),
    ];

    let actual = format_diagnostics(&all_diagnostics(&st, Some(lint)));
    let expected = expect![[r#"
        13:0-13:32 error: invalid syntax
        8:7-8:23 warning [F401]: 'collagraph' imported but unused"#]];
    expected.assert_eq(&actual);
}

#[test]
fn malformed_expression_is_one_diagnostic_and_extraction_continues() {
    let source = "\
<template>
  <label :text=\"'oops />
  <button @clicked=\"go\" />
</template>
<script>
x = 1
</script>
";
    let st = state(source);
    // The malformed expression contributed nothing, the healthy one did.
    assert!(st.references.contains("go"));

    let actual = format_diagnostics(&all_diagnostics(&st, None));
    let expected = expect![[r#"
        1:16-1:23 warning [malformed-expression]: cannot parse template expression: unterminated string literal"#]];
    expected.assert_eq(&actual);
}

#[test]
fn unbalanced_script_markers_are_reported_not_fatal() {
    let source = "\
<template>
  <label :text=\"self.message\" />
</template>
<script>
x = 1
";
    let st = state(source);
    // No recoverable script region, but references still extracted.
    assert!(st.script.is_none());
    assert!(st.references.contains("self"));

    let actual = format_diagnostics(&all_diagnostics(&st, None));
    let expected = expect![[r#"
        3:0-3:8 error [malformed-document]: unterminated <script> block"#]];
    expected.assert_eq(&actual);
}

// ---------------------------------------------------------------------------
// Tests — stale results
// ---------------------------------------------------------------------------

#[test]
fn stale_lint_result_is_never_published() {
    let store = DocumentStore::new();
    let uri = Url::parse("file:///demo/counter.cgx").unwrap();

    let v1 = store.open(uri.clone(), COUNTER.to_string(), 1, MARKER);
    // An edit arrives while the v1 lint task is still outstanding.
    let v2 = store.open(uri.clone(), COUNTER.replace("bump", "tick"), 2, MARKER);

    // The publish guard used by the server: a result is only published when
    // its originating version still matches the store.
    assert_ne!(store.current_version(&uri), Some(v1.version));
    assert_eq!(store.current_version(&uri), Some(v2.version));
}

// ---------------------------------------------------------------------------
// Tests — formatting
// ---------------------------------------------------------------------------

#[test]
fn formatting_splices_script_region_only() {
    let source = "\
<template>
  <label :text=\"self.message\" />
</template>
<script>
import collagraph as cg
x=1
</script>
";
    let st = state(source);

    // A plausible `ruff format` result over the virtual text: placeholders
    // untouched, script reformatted, synthetic declaration still at the end.
    let formatted_virtual = "\
##########
################################
###########
########
import collagraph as cg

x = 1
#########
#

def __cgx_template_refs__():  # noqa
    self
";
    let edit = splice_formatted(&st, formatted_virtual).expect("an edit");
    assert_eq!(edit.new_text, "import collagraph as cg\n\nx = 1");
    assert_eq!(edit.range.start, Position::new(4, 0));
    assert_eq!(edit.range.end, Position::new(5, 3));

    // Identical output produces no edit at all.
    let unchanged = formatted_virtual.replace("\n\nx = 1", "\nx=1");
    assert!(splice_formatted(&st, &unchanged).is_none());
}

// ---------------------------------------------------------------------------
// Tests — completion
// ---------------------------------------------------------------------------

/// Completion engine stub recording the virtual coordinates it was given.
struct StubEngine;

#[async_trait]
impl CompletionEngine for StubEngine {
    async fn complete(
        &self,
        virtual_text: &str,
        line: u32,
        column: u32,
    ) -> Result<Vec<RawCompletionItem>, CollabError> {
        // The engine sees the full virtual text with the synthetic tail.
        assert!(virtual_text.contains("def __cgx_template_refs__():"));
        // Jedi-style coordinates: 1-based line, 0-based column.
        assert_eq!((line, column), (14, 13));
        Ok(vec![
            RawCompletionItem {
                label: "state".to_string(),
                kind: "property".to_string(),
                detail: Some("self.state".to_string()),
                documentation: None,
                insert_text: "state".to_string(),
            },
            RawCompletionItem {
                label: "bump".to_string(),
                kind: "function".to_string(),
                detail: None,
                documentation: None,
                insert_text: "bump".to_string(),
            },
        ])
    }
}

#[tokio::test]
async fn completion_runs_in_virtual_coordinates() {
    let st = state(COUNTER);
    // Cursor on line 13 (`        self.state[...]`), after `self.`.
    let response = cgxlsp::completion_at_position(&st, &StubEngine, Position::new(13, 13))
        .await
        .unwrap();

    let Some(CompletionResponse::Array(items)) = response else {
        panic!("expected completion items");
    };
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].label, "state");
    assert_eq!(items[0].kind, Some(CompletionItemKind::PROPERTY));
    assert_eq!(items[1].kind, Some(CompletionItemKind::FUNCTION));
}

#[tokio::test]
async fn no_completion_in_template_markup() {
    let st = state(COUNTER);
    let response = cgxlsp::completion_at_position(&st, &StubEngine, Position::new(2, 10))
        .await
        .unwrap();
    assert!(response.is_none());
}
