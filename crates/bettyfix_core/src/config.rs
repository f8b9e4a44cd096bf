//! Tool configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LintError;

/// Configuration for driving betty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Betty executable name or path.
    #[serde(default = "default_betty_path")]
    pub betty_path: String,

    /// Extra arguments passed before the file name.
    #[serde(default)]
    pub args: Vec<String>,

    /// Kill a betty run after this many milliseconds, when set.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_betty_path() -> String {
    "betty".to_string()
}

impl Config {
    /// Conventional configuration file names, in discovery order.
    pub const CONFIG_FILES: &'static [&'static str] = &[".bettyfix.jsonc", ".bettyfix.json"];

    pub fn new() -> Self {
        Self {
            betty_path: default_betty_path(),
            args: Vec::new(),
            timeout_ms: None,
        }
    }

    /// Path of the first config file present in `dir`, if any.
    pub fn discover(dir: impl AsRef<Path>) -> Option<PathBuf> {
        let dir = dir.as_ref();
        Self::CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Loads configuration from a file. Comments and trailing commas are
    /// allowed regardless of the extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LintError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| LintError::config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    /// Parses configuration from a JSONC string.
    pub fn from_json(json: &str) -> Result<Self, LintError> {
        let value = jsonc_parser::parse_to_serde_value(json, &jsonc_parser::ParseOptions::default())
            .map_err(|e| LintError::config(format!("invalid config: {e}")))?
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
        serde_json::from_value(value).map_err(|e| LintError::config(format!("invalid config: {e}")))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
