//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the bundled engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of password prompts per load (None = keep asking).
    pub max_password_attempts: Option<u32>,

    /// Range size used when reading from a transport.
    pub chunk_size: usize,

    /// User-Agent header for HTTP sources.
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_password_attempts: None,
            chunk_size: 64 * 1024,
            user_agent: format!("pdfload/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl EngineConfig {
    pub fn with_max_password_attempts(mut self, attempts: u32) -> Self {
        self.max_password_attempts = Some(attempts);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}
