//! Observable load state.
//!
//! Every field a caller can watch is a projection of one [`LoadState`]
//! snapshot carried by a `tokio::sync::watch` channel. Writers update the
//! snapshot in a single `send_modify`, so related fields (document and page
//! count) always change together.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use pdfload_engine::DocumentHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::models::DocumentInfo;

/// Shared handle to an opened document, compared by identity.
#[derive(Clone)]
pub struct DocumentRef(Arc<dyn DocumentHandle>);

impl DocumentRef {
    pub fn new(handle: Arc<dyn DocumentHandle>) -> Self {
        Self(handle)
    }
}

impl Deref for DocumentRef {
    type Target = dyn DocumentHandle;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for DocumentRef {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// Snapshot of one load attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadState {
    /// The opened document, once available.
    pub document: Option<DocumentRef>,
    /// Number of pages, 0 until the document opens.
    pub page_count: u32,
    /// Enrichment result, `None` until it completes.
    pub info: Option<Arc<DocumentInfo>>,
    /// True until the load sequence finished, successfully or not.
    pub is_loading: bool,
}

impl LoadState {
    /// State at invocation time.
    pub fn initial() -> Self {
        Self {
            document: None,
            page_count: 0,
            info: None,
            is_loading: true,
        }
    }
}

impl Default for LoadState {
    fn default() -> Self {
        Self::initial()
    }
}

/// A single observable field of a [`LoadState`].
///
/// Reads are synchronous through [`get`](Self::get). Changes can be awaited
/// with [`changed`](Self::changed) or pushed to a listener with
/// [`subscribe`](Self::subscribe). Each clone tracks its own position.
pub struct Observable<T> {
    rx: watch::Receiver<LoadState>,
    project: fn(&LoadState) -> T,
    last: T,
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub(crate) fn new(rx: watch::Receiver<LoadState>, project: fn(&LoadState) -> T) -> Self {
        let last = project(&rx.borrow());
        Self { rx, project, last }
    }

    /// Current value.
    pub fn get(&self) -> T {
        (self.project)(&self.rx.borrow())
    }

    /// Wait for the next value that differs from the last one seen.
    ///
    /// Returns `None` once the load has finished and the value can no longer
    /// change.
    pub async fn changed(&mut self) -> Option<T> {
        loop {
            let closed = self.rx.changed().await.is_err();
            let current = (self.project)(&self.rx.borrow_and_update());
            if current != self.last {
                self.last = current.clone();
                return Some(current);
            }
            if closed {
                return None;
            }
        }
    }

    /// Wait until the value satisfies `predicate`, checking the current value
    /// first.
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Option<T> {
        let current = self.get();
        self.last = current.clone();
        if predicate(&current) {
            return Some(current);
        }
        while let Some(value) = self.changed().await {
            if predicate(&value) {
                return Some(value);
            }
        }
        None
    }

    /// Call `listener` with every new value until the returned
    /// [`Subscription`] is dropped or the load finishes.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<F>(&self, mut listener: F) -> Subscription
    where
        F: FnMut(T) + Send + 'static,
    {
        let mut observable = self.clone();
        observable.last = observable.get();
        let task = tokio::spawn(async move {
            while let Some(value) = observable.changed().await {
                listener(value);
            }
        });
        Subscription { task }
    }
}

impl<T: Clone> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            project: self.project,
            last: self.last.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &(self.project)(&self.rx.borrow()))
            .finish()
    }
}

/// Listener registration returned by [`Observable::subscribe`].
///
/// Dropping it stops notifications.
#[must_use = "dropping a subscription stops its listener"]
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Wait for the listener to see the final value.
    pub async fn finished(mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
