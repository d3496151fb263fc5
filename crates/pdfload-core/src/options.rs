//! Per-load options.

use std::fmt;
use std::sync::Arc;

use pdfload_engine::{PasswordCallback, PasswordReason, PasswordResponder, Progress, ProgressCallback};

use crate::error::LoadError;

/// One-shot failure handler.
///
/// The default handler ignores the error; failures are still logged by the
/// orchestrator.
pub struct ErrorHandler(Box<dyn FnOnce(LoadError) + Send>);

impl ErrorHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: FnOnce(LoadError) + Send + 'static,
    {
        Self(Box::new(handler))
    }

    /// Handler that drops the error.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub(crate) fn call(self, error: LoadError) {
        (self.0)(error)
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorHandler")
    }
}

/// Options for a single load.
///
/// All fields are optional. `on_password` takes priority over `password`.
#[derive(Default)]
pub struct LoadOptions {
    /// Password resupplied on every engine request (default mode).
    pub password: Option<String>,

    /// Caller-controlled password protocol (delegated mode).
    pub on_password: Option<PasswordCallback>,

    /// Receives progress events until the loading task settles.
    pub on_progress: Option<ProgressCallback>,

    /// Called once if loading or enrichment fails.
    pub on_error: ErrorHandler,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn on_password<F>(mut self, callback: F) -> Self
    where
        F: Fn(PasswordResponder, PasswordReason) + Send + Sync + 'static,
    {
        self.on_password = Some(Arc::new(callback));
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(LoadError) + Send + 'static,
    {
        self.on_error = ErrorHandler::new(handler);
        self
    }
}

impl fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOptions")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("on_password", &self.on_password.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish_non_exhaustive()
    }
}
