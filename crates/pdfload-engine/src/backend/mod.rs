//! Engine backend implementations.

mod catalog;
mod encryption;
pub mod lopdf;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::hooks::LoadHooks;
use crate::source::DocumentSource;
use crate::types::{Attachment, DocumentMetadata};
use crate::Result;

/// Trait for document engines.
///
/// An engine turns a source into a [`LoadingTask`]. Callbacks are passed in
/// up front through [`LoadHooks`], so nothing can be missed between starting
/// the task and wiring its callbacks.
pub trait DocumentEngine: Send + Sync {
    /// Start loading a document.
    fn open(&self, source: DocumentSource, hooks: LoadHooks) -> LoadingTask;
}

/// An opened document.
#[async_trait]
pub trait DocumentHandle: Send + Sync + fmt::Debug {
    /// Number of pages.
    fn page_count(&self) -> u32;

    /// Stable identifier derived from the document, if it has one.
    fn fingerprint(&self) -> Option<String>;

    /// Document info and XMP metadata.
    async fn metadata(&self) -> Result<DocumentMetadata>;

    /// Embedded files keyed by their name-tree key.
    async fn attachments(&self) -> Result<BTreeMap<String, Attachment>>;

    /// Document-level JavaScript sources, in document order.
    async fn javascript(&self) -> Result<Vec<String>>;
}

/// A single in-progress open operation.
///
/// Resolves once with the opened document or the reason it could not be
/// opened.
#[must_use = "a loading task does nothing unless awaited"]
pub struct LoadingTask {
    inner: BoxFuture<'static, Result<Arc<dyn DocumentHandle>>>,
}

impl LoadingTask {
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<Arc<dyn DocumentHandle>>> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }

    /// A task that has already failed.
    pub fn failed(error: crate::EngineError) -> Self {
        Self::new(async move { Err(error) })
    }
}

impl Future for LoadingTask {
    type Output = Result<Arc<dyn DocumentHandle>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for LoadingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadingTask").finish_non_exhaustive()
    }
}
