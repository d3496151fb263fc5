//! Error types for the pdfload-core library.

use std::fmt;

use pdfload_engine::EngineError;
use thiserror::Error;

/// Main error type for the pdfload library.
#[derive(Error, Debug)]
pub enum PdfLoadError {
    /// A document load failed.
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Why a load attempt failed. Delivered to the `on_error` handler.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The loading task rejected: bad source, corrupt document, unresolved
    /// password or failed fetch.
    #[error("failed to open document: {0}")]
    Open(#[source] EngineError),

    /// The document opened but one of the metadata fetches failed.
    #[error("{0}")]
    Enrichment(#[from] EnrichmentError),

    /// The engine or one of the load callbacks panicked.
    #[error("load aborted by a panic: {0}")]
    Panicked(String),
}

impl LoadError {
    /// The engine error at the root of this failure, if the engine reported
    /// one.
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            LoadError::Open(source) => Some(source),
            LoadError::Enrichment(err) => Some(&err.source),
            LoadError::Panicked(_) => None,
        }
    }

    pub fn is_open_failure(&self) -> bool {
        matches!(self, LoadError::Open(_))
    }
}

/// Which enrichment request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentStage {
    Metadata,
    Attachments,
    JavaScript,
}

impl fmt::Display for EnrichmentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrichmentStage::Metadata => write!(f, "metadata"),
            EnrichmentStage::Attachments => write!(f, "attachments"),
            EnrichmentStage::JavaScript => write!(f, "javascript"),
        }
    }
}

/// An enrichment request failed after the document was opened.
#[derive(Error, Debug)]
#[error("{stage} enrichment failed: {source}")]
pub struct EnrichmentError {
    pub stage: EnrichmentStage,
    #[source]
    pub source: EngineError,
}

impl EnrichmentError {
    pub fn new(stage: EnrichmentStage, source: EngineError) -> Self {
        Self { stage, source }
    }
}

/// Result type for the pdfload library.
pub type Result<T> = std::result::Result<T, PdfLoadError>;
