//! Compile options, read from a TOML table

use crate::CompileError;
use anyhow::Context as _;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Knobs of one compilation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileOptions {
    /// Module owning top-level code outside any module qualifier
    pub user_module: String,

    /// Trace every symbol and temporary as it is created
    pub trace_symbols: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            user_module: "user".to_string(),
            trace_symbols: false,
        }
    }
}

impl CompileOptions {
    /// Parse options from TOML text; absent keys keep their defaults
    ///
    /// # Errors
    ///
    /// `Options` when the text is not a valid options table.
    pub fn from_toml_str(text: &str) -> Result<Self, CompileError> {
        Ok(toml::from_str(text)?)
    }

    /// Load options from a file
    ///
    /// # Errors
    ///
    /// When the file cannot be read or does not hold a valid options table.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read options file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse options file: {}", path.display()))
    }
}
