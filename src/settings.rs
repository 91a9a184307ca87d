//! Settings infrastructure for cgxlsp.
//!
//! Loads and parses `cgxlsp.toml` files that configure the external tool
//! commands and the synthesis suppression marker.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::collab::{CompletionEngine, Formatter, JediCompleter, Linter, RuffFormatter, RuffLinter};

/// File name looked up during discovery.
const SETTINGS_FILE: &str = "cgxlsp.toml";

/// Root settings structure loaded from cgxlsp.toml.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    pub linter: Option<LinterSettings>,
    pub formatter: Option<FormatterSettings>,
    pub completion: Option<CompletionSettings>,
    pub synthesis: Option<SynthesisSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LinterSettings {
    /// Linter binary (default "ruff").
    pub command: Option<String>,
    /// Rule classes suppressed on the virtual file, e.g. ["D", "N801"].
    pub ignore: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FormatterSettings {
    /// Formatter binary (default "ruff").
    pub command: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompletionSettings {
    /// Python interpreter with jedi installed (default "python3").
    pub python: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SynthesisSettings {
    /// Marker appended to the synthetic declaration header so lint style
    /// rules do not fire on generated code.
    pub suppress_marker: Option<String>,
}

impl Settings {
    pub fn suppress_marker(&self) -> String {
        self.synthesis
            .as_ref()
            .and_then(|s| s.suppress_marker.clone())
            .unwrap_or_else(|| "  # noqa".to_string())
    }

    fn linter_command(&self) -> String {
        self.linter
            .as_ref()
            .and_then(|l| l.command.clone())
            .unwrap_or_else(|| "ruff".to_string())
    }

    fn linter_ignore(&self) -> Vec<String> {
        self.linter
            .as_ref()
            .and_then(|l| l.ignore.clone())
            .unwrap_or_default()
    }

    fn formatter_command(&self) -> String {
        self.formatter
            .as_ref()
            .and_then(|f| f.command.clone())
            .unwrap_or_else(|| "ruff".to_string())
    }

    fn completion_python(&self) -> String {
        self.completion
            .as_ref()
            .and_then(|c| c.python.clone())
            .unwrap_or_else(|| "python3".to_string())
    }
}

/// The external tools a server instance talks to.
pub struct ToolSet {
    pub linter: Arc<dyn Linter>,
    pub formatter: Arc<dyn Formatter>,
    pub completion: Arc<dyn CompletionEngine>,
}

/// Build the production tool set from settings.
pub fn build_toolset(settings: &Settings) -> ToolSet {
    ToolSet {
        linter: Arc::new(RuffLinter::new(
            settings.linter_command(),
            settings.linter_ignore(),
        )),
        formatter: Arc::new(RuffFormatter::new(settings.formatter_command())),
        completion: Arc::new(JediCompleter::new(settings.completion_python())),
    }
}

/// Load settings from a cgxlsp.toml file.
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("failed to parse {}: {}", path.display(), e);
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    }
}

/// Discover cgxlsp.toml by searching up the directory tree, then direct
/// children.
///
/// Returns `(settings, settings_dir)` where `settings_dir` is the directory
/// containing the found file. If not found, returns defaults with
/// `start_dir`.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join(SETTINGS_FILE);
        if candidate.is_file() {
            return (load_settings(&candidate), dir.to_path_buf());
        }
        current = dir.parent();
    }

    if let Ok(entries) = std::fs::read_dir(start_dir) {
        for entry in entries.flatten() {
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                let candidate = entry.path().join(SETTINGS_FILE);
                if candidate.is_file() {
                    return (load_settings(&candidate), entry.path());
                }
            }
        }
    }

    (Settings::default(), start_dir.to_path_buf())
}
