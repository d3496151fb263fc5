//! Document engine boundary for pdfload.
//!
//! This crate defines the contract between the load orchestrator and a
//! document engine:
//! - [`DocumentEngine`] starts a [`LoadingTask`] for a [`DocumentSource`]
//! - [`LoadHooks`] carries the progress and password callbacks into the task
//! - [`DocumentHandle`] exposes page count, metadata, attachments and scripts
//!
//! A lopdf-backed engine ([`LopdfEngine`]) is bundled so the facade can be used
//! without a third-party renderer.

mod backend;
mod config;
mod error;
mod hooks;
mod source;
mod types;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use backend::lopdf::LopdfEngine;
pub use backend::{DocumentEngine, DocumentHandle, LoadingTask};
pub use config::EngineConfig;
pub use error::EngineError;
pub use hooks::{LoadHooks, PasswordCallback, PasswordResponder, ProgressCallback};
pub use source::{DocumentSource, RangeTransport};
pub use types::{Attachment, DocumentMetadata, PasswordReason, Progress};

use std::sync::Arc;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Create the bundled engine.
///
/// This is the one-time initialization step a host performs before the first
/// load; the returned engine is cheap to share across loads.
pub fn init(config: EngineConfig) -> Arc<dyn DocumentEngine> {
    tracing::debug!(?config, "initializing lopdf engine");
    Arc::new(LopdfEngine::new(config))
}
