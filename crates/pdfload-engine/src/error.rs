//! Error types for the engine layer.

use thiserror::Error;

/// Errors reported by a document engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The source kind is not supported by this engine build.
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    /// Fetching the document bytes failed.
    #[error("failed to fetch document: {0}")]
    Fetch(String),

    /// I/O error while reading a local source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes could not be parsed as a document.
    #[error("failed to parse document: {0}")]
    Parse(String),

    /// The document uses an encryption scheme this engine cannot decrypt.
    #[error("unsupported encryption: {0}")]
    UnsupportedEncryption(String),

    /// The document is encrypted and no password was given.
    #[error("no password given")]
    PasswordRequired,

    /// The supplied password was rejected and the engine stopped asking.
    #[error("incorrect password after {attempts} attempt(s)")]
    IncorrectPassword { attempts: u32 },

    /// Reading the document metadata failed.
    #[error("failed to read metadata: {0}")]
    Metadata(String),

    /// Reading the attachment table failed.
    #[error("failed to read attachments: {0}")]
    Attachments(String),

    /// Reading the embedded scripts failed.
    #[error("failed to read JavaScript: {0}")]
    JavaScript(String),

    /// A blocking worker task panicked or was shut down.
    #[error("engine worker failed: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        EngineError::Worker(err.to_string())
    }
}
