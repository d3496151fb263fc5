//! Configuration file for pdfload.

use std::path::Path;

use pdfload_engine::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::error::{PdfLoadError, Result};

/// Main configuration for pdfload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfLoadConfig {
    /// Engine configuration.
    pub engine: EngineConfig,

    /// Report output configuration.
    pub output: OutputConfig,
}

/// How loaded documents are reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print JSON output.
    pub pretty: bool,

    /// Include full script sources in reports (otherwise only a count).
    pub include_scripts: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            include_scripts: false,
        }
    }
}

impl PdfLoadConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| PdfLoadError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| PdfLoadError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
