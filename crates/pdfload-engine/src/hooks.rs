//! Callbacks injected into a loading task when it is created.

use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::types::{PasswordReason, Progress};
use crate::{EngineError, Result};

/// Receives every progress event of a loading task.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Asked for a password whenever the engine needs one, possibly repeatedly.
pub type PasswordCallback = Arc<dyn Fn(PasswordResponder, PasswordReason) + Send + Sync>;

/// One-shot channel back to the engine for a single password request.
///
/// The responder may be kept and answered later. Dropping it without calling
/// [`supply`](Self::supply) leaves the request unanswered.
pub struct PasswordResponder {
    tx: oneshot::Sender<String>,
}

impl PasswordResponder {
    /// Answer the pending request.
    pub fn supply(self, password: impl Into<String>) {
        // The task may already be gone; nothing left to answer then.
        let _ = self.tx.send(password.into());
    }
}

impl fmt::Debug for PasswordResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordResponder").finish_non_exhaustive()
    }
}

/// Callbacks handed to [`DocumentEngine::open`](crate::DocumentEngine::open).
#[derive(Clone, Default)]
pub struct LoadHooks {
    pub on_progress: Option<ProgressCallback>,
    pub on_password: Option<PasswordCallback>,
}

impl LoadHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn with_password(mut self, callback: PasswordCallback) -> Self {
        self.on_password = Some(callback);
        self
    }

    /// Forward a progress event, if anyone listens.
    pub fn report_progress(&self, progress: Progress) {
        trace!(loaded = progress.loaded, total = progress.total, "progress");
        if let Some(callback) = &self.on_progress {
            callback(progress);
        }
    }

    /// Ask the password callback and wait for its answer.
    ///
    /// Fails with [`EngineError::PasswordRequired`] when no callback is
    /// installed or the responder was dropped unanswered.
    pub async fn request_password(&self, reason: PasswordReason) -> Result<String> {
        let Some(callback) = &self.on_password else {
            debug!(%reason, "password requested but no handler installed");
            return Err(EngineError::PasswordRequired);
        };

        let (tx, rx) = oneshot::channel();
        callback(PasswordResponder { tx }, reason);

        rx.await.map_err(|_| {
            debug!(%reason, "password request dropped without an answer");
            EngineError::PasswordRequired
        })
    }
}

impl fmt::Debug for LoadHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadHooks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_password", &self.on_password.is_some())
            .finish()
    }
}
