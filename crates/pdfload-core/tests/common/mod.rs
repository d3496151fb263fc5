//! Scripted engine and document doubles for orchestrator tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pdfload_core::{
    Attachment, DocumentEngine, DocumentHandle, DocumentMetadata, DocumentSource, EngineError,
    LoadError, LoadHooks, LoadingTask,
};

/// Engine whose behavior is a closure over the source and hooks.
pub struct FnEngine<F>(pub F);

impl<F> DocumentEngine for FnEngine<F>
where
    F: Fn(DocumentSource, LoadHooks) -> LoadingTask + Send + Sync,
{
    fn open(&self, source: DocumentSource, hooks: LoadHooks) -> LoadingTask {
        (self.0)(source, hooks)
    }
}

/// Wrap a closure as a shareable engine.
pub fn engine<F>(open: F) -> Arc<dyn DocumentEngine>
where
    F: Fn(DocumentSource, LoadHooks) -> LoadingTask + Send + Sync + 'static,
{
    Arc::new(FnEngine(open))
}

/// Which enrichment request should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Nothing,
    Metadata,
    Attachments,
    JavaScript,
    /// Panic inside the metadata request.
    MetadataPanic,
}

#[derive(Debug)]
pub struct MockDocument {
    pub pages: u32,
    pub fail_at: FailAt,
    pub calls: Mutex<Vec<&'static str>>,
}

impl MockDocument {
    pub fn new(pages: u32) -> Arc<Self> {
        Self::failing(pages, FailAt::Nothing)
    }

    pub fn failing(pages: u32, fail_at: FailAt) -> Arc<Self> {
        Arc::new(Self {
            pages,
            fail_at,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DocumentHandle for MockDocument {
    fn page_count(&self) -> u32 {
        self.pages
    }

    fn fingerprint(&self) -> Option<String> {
        None
    }

    async fn metadata(&self) -> pdfload_core::EngineResult<DocumentMetadata> {
        self.record("metadata");
        if self.fail_at == FailAt::MetadataPanic {
            panic!("metadata reader crashed");
        }
        if self.fail_at == FailAt::Metadata {
            return Err(EngineError::Metadata("broken info".into()));
        }
        Ok(DocumentMetadata {
            pdf_format_version: "1.7".into(),
            title: Some("Mock".into()),
            ..Default::default()
        })
    }

    async fn attachments(&self) -> pdfload_core::EngineResult<BTreeMap<String, Attachment>> {
        self.record("attachments");
        if self.fail_at == FailAt::Attachments {
            return Err(EngineError::Attachments("broken name tree".into()));
        }
        let mut files = BTreeMap::new();
        files.insert(
            "data".to_string(),
            Attachment {
                filename: "data.csv".into(),
                description: None,
                content: b"a,b\n1,2\n".to_vec(),
            },
        );
        Ok(files)
    }

    async fn javascript(&self) -> pdfload_core::EngineResult<Vec<String>> {
        self.record("javascript");
        if self.fail_at == FailAt::JavaScript {
            return Err(EngineError::JavaScript("broken action".into()));
        }
        Ok(vec!["app.alert(1);".into()])
    }
}

/// Engine that always opens the given document.
pub fn opening(document: Arc<MockDocument>) -> Arc<dyn DocumentEngine> {
    engine(move |_source, _hooks| {
        let document = document.clone();
        LoadingTask::new(async move { Ok(document as Arc<dyn DocumentHandle>) })
    })
}

/// Engine that always fails to open.
pub fn failing_open() -> Arc<dyn DocumentEngine> {
    engine(|_source, _hooks| LoadingTask::failed(EngineError::Parse("not a PDF".into())))
}

/// Collects errors passed to `on_error`.
#[derive(Clone, Default)]
pub struct ErrorSink(pub Arc<Mutex<Vec<LoadError>>>);

impl ErrorSink {
    pub fn handler(&self) -> impl FnOnce(LoadError) + Send + use<> {
        let errors = self.0.clone();
        move |error| errors.lock().unwrap().push(error)
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn take(&self) -> Vec<LoadError> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}
