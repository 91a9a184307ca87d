//! Synthetic body construction.
//!
//! Turns the template's identifier reference set into the body of the
//! appended declaration: one bare-name expression statement per referenced
//! identifier. A bare name is a no-op the linter counts as a use, and it
//! cannot trip unused-result style rules. The statements are emitted in
//! sorted order so synthesis stays deterministic.

use std::collections::BTreeSet;

/// Indentation of statements inside the synthetic declaration.
const INDENT: &str = "    ";

/// Build the synthetic function body for the given reference set.
///
/// The empty set yields a single `pass` statement; an empty body would not be
/// valid Python.
pub fn build(references: &BTreeSet<String>) -> String {
    if references.is_empty() {
        return format!("{INDENT}pass");
    }

    references
        .iter()
        .map(|name| format!("{INDENT}{name}"))
        .collect::<Vec<_>>()
        .join("\n")
}
