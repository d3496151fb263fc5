//! Observable document loading.
//!
//! [`DocumentLoader::load`] starts a load and returns a [`LoadView`] right
//! away. The view's four observables then move forward on their own:
//!
//! ```text
//! is_loading: true ──────────────────────────────────────────► false
//! document:   None ─────► Some(doc)
//! page_count: 0    ─────► n
//! info:       None ─────────────────────► Some(info)
//!                  open ok         enrichment ok        done
//! ```
//!
//! On failure `document`/`page_count`/`info` stop where they are, the
//! `on_error` handler runs, and `is_loading` still turns false.

mod enrichment;
mod orchestrator;
mod password;

pub use enrichment::enrich;
pub use password::PasswordMode;

use std::sync::Arc;

use pdfload_engine::{DocumentEngine, DocumentSource};
use tokio::sync::watch;

use crate::models::{DocumentInfo, PdfLoadConfig};
use crate::observable::{DocumentRef, LoadState, Observable};
use crate::options::LoadOptions;

/// Entry point for loading documents through an engine.
#[derive(Clone)]
pub struct DocumentLoader {
    engine: Arc<dyn DocumentEngine>,
}

impl DocumentLoader {
    pub fn new(engine: Arc<dyn DocumentEngine>) -> Self {
        Self { engine }
    }

    /// Loader backed by the bundled engine.
    pub fn from_config(config: &PdfLoadConfig) -> Self {
        Self::new(pdfload_engine::init(config.engine.clone()))
    }

    /// Start loading `source` and return its observables immediately.
    ///
    /// Every call is independent: fresh observables, a fresh loading task.
    /// Failures are reported through `options.on_error`, never returned.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn load(&self, source: impl Into<DocumentSource>, options: LoadOptions) -> LoadView {
        let (tx, rx) = watch::channel(LoadState::initial());
        let view = LoadView::new(rx);
        tokio::spawn(orchestrator::start(
            self.engine.as_ref(),
            source.into(),
            options,
            tx,
        ));
        view
    }
}

impl std::fmt::Debug for DocumentLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentLoader").finish_non_exhaustive()
    }
}

/// The observables of one load.
#[derive(Debug, Clone)]
pub struct LoadView {
    pub document: Observable<Option<DocumentRef>>,
    pub page_count: Observable<u32>,
    pub info: Observable<Option<Arc<DocumentInfo>>>,
    pub is_loading: Observable<bool>,
    state: watch::Receiver<LoadState>,
}

impl LoadView {
    fn new(rx: watch::Receiver<LoadState>) -> Self {
        Self {
            document: Observable::new(rx.clone(), |s| s.document.clone()),
            page_count: Observable::new(rx.clone(), |s| s.page_count),
            info: Observable::new(rx.clone(), |s| s.info.clone()),
            is_loading: Observable::new(rx.clone(), |s| s.is_loading),
            state: rx,
        }
    }

    /// All four fields, read together.
    pub fn snapshot(&self) -> LoadState {
        self.state.borrow().clone()
    }

    /// Wait until `is_loading` is false and return the final state.
    ///
    /// Never resolves while the engine keeps asking for a password that
    /// keeps being rejected.
    pub async fn settled(&self) -> LoadState {
        let mut rx = self.state.clone();
        if let Ok(state) = rx.wait_for(|s| !s.is_loading).await {
            return state.clone();
        }
        // Only reached when the runtime drops the driver mid-load.
        rx.borrow().clone()
    }
}
