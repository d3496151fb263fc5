//! Drives one load: loading task, then enrichment, then the final
//! `is_loading` flip.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use pdfload_engine::{DocumentEngine, DocumentSource, LoadHooks, LoadingTask, ProgressCallback};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use super::enrichment::enrich;
use super::password;
use crate::error::LoadError;
use crate::observable::{DocumentRef, LoadState};
use crate::options::{ErrorHandler, LoadOptions};

/// Start the engine's loading task and return the future that drives the
/// rest of the sequence.
///
/// The task is created before this returns; the driver only awaits it.
pub(crate) fn start(
    engine: &dyn DocumentEngine,
    source: DocumentSource,
    options: LoadOptions,
    state: watch::Sender<LoadState>,
) -> impl Future<Output = ()> + Send + use<> {
    let LoadOptions {
        password,
        on_password,
        on_progress,
        on_error,
    } = options;

    let settled = Arc::new(AtomicBool::new(false));
    let mut hooks = LoadHooks::new();

    if let Some(callback) = on_progress {
        hooks = hooks.with_progress(until_settled(callback, settled.clone()));
    }

    let (mode, password_hook) = password::select(on_password, password);
    if let Some(callback) = password_hook {
        hooks = hooks.with_password(callback);
    }

    let description = source.describe();
    debug!(source = %description, ?mode, "starting load");
    let task = engine.open(source, hooks);

    drive(task, settled, state, on_error, description)
}

async fn drive(
    task: LoadingTask,
    settled: Arc<AtomicBool>,
    state: watch::Sender<LoadState>,
    on_error: ErrorHandler,
    description: String,
) {
    let outcome = AssertUnwindSafe(run(task, &settled, &state))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(LoadError::Panicked(panic_message(payload.as_ref()))));
    // A panic inside the task skips the store in `run`.
    settled.store(true, Ordering::SeqCst);

    if let Err(error) = outcome {
        warn!(source = %description, "load failed: {}", error);
        if panic::catch_unwind(AssertUnwindSafe(|| on_error.call(error))).is_err() {
            warn!(source = %description, "error handler panicked");
        }
    }

    state.send_modify(|s| s.is_loading = false);
    debug!(source = %description, "load finished");
}

async fn run(
    task: LoadingTask,
    settled: &AtomicBool,
    state: &watch::Sender<LoadState>,
) -> Result<(), LoadError> {
    let result = task.await;
    settled.store(true, Ordering::SeqCst);

    let document = result.map_err(LoadError::Open)?;
    let page_count = document.page_count();
    state.send_modify(|s| {
        s.document = Some(DocumentRef::new(document.clone()));
        s.page_count = page_count;
    });
    debug!(page_count, "document published");

    let info = enrich(document.as_ref()).await?;
    state.send_modify(|s| s.info = Some(Arc::new(info)));
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Forward progress until the loading task settles, drop it afterwards.
fn until_settled(callback: ProgressCallback, settled: Arc<AtomicBool>) -> ProgressCallback {
    Arc::new(move |progress| {
        if settled.load(Ordering::SeqCst) {
            trace!(?progress, "dropping progress after settle");
            return;
        }
        callback(progress);
    })
}
