//! Core library for observable document loading.
//!
//! This crate provides:
//! - A load orchestrator that turns an engine loading task into observables
//! - The password protocol (delegated and default modes)
//! - Post-open enrichment (metadata, attachments, embedded scripts)
//! - The configuration file shared by the CLI

pub mod error;
pub mod load;
pub mod models;
pub mod observable;
pub mod options;

pub use error::{EnrichmentError, EnrichmentStage, LoadError, PdfLoadError, Result};
pub use load::{enrich, DocumentLoader, LoadView, PasswordMode};
pub use models::{DocumentInfo, OutputConfig, PdfLoadConfig};
pub use observable::{DocumentRef, LoadState, Observable, Subscription};
pub use options::{ErrorHandler, LoadOptions};

/// Re-export engine types.
pub use pdfload_engine::{
    Attachment, DocumentEngine, DocumentHandle, DocumentMetadata, DocumentSource, EngineConfig,
    EngineError, LoadHooks, LoadingTask, PasswordReason, PasswordResponder, Progress,
    RangeTransport, Result as EngineResult,
};
