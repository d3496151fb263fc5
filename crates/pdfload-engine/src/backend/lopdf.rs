//! lopdf backend: fetches the source, unlocks encrypted documents and serves
//! catalog data from the parsed object graph.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use lopdf::Document;
use percent_encoding::percent_decode_str;
use tracing::{debug, info, trace};

use super::catalog;
use super::encryption::SecurityHandler;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::hooks::LoadHooks;
use crate::source::{DocumentSource, RangeTransport};
use crate::types::{Attachment, DocumentMetadata, PasswordReason, Progress};
use crate::{DocumentEngine, DocumentHandle, LoadingTask, Result};

/// Engine parsing documents with lopdf on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct LopdfEngine {
    config: EngineConfig,
}

impl LopdfEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl DocumentEngine for LopdfEngine {
    fn open(&self, source: DocumentSource, hooks: LoadHooks) -> LoadingTask {
        let config = self.config.clone();
        LoadingTask::new(async move {
            let description = source.describe();
            debug!(source = %description, "opening document");

            let data = fetch(source, &hooks, &config).await?;
            let content_length = data.len() as u64;
            let (document, encrypted) = unlock(data, &hooks, &config).await?;

            let handle = LopdfDocument::new(document, content_length, encrypted);
            info!(
                source = %description,
                pages = handle.page_count(),
                encrypted,
                "document opened"
            );
            Ok(Arc::new(handle) as Arc<dyn DocumentHandle>)
        })
    }
}

/// Upper bound for buffer preallocation. Announced lengths come from the
/// source and are not trusted beyond this.
fn initial_capacity(total: u64, chunk_size: usize) -> usize {
    let limit = (chunk_size.max(1) as u64).saturating_mul(PREALLOCATED_CHUNKS);
    usize::try_from(total.min(limit)).unwrap_or(0)
}

const PREALLOCATED_CHUNKS: u64 = 16;

async fn fetch(source: DocumentSource, hooks: &LoadHooks, config: &EngineConfig) -> Result<Vec<u8>> {
    match source {
        DocumentSource::Bytes(bytes) => {
            let len = bytes.len() as u64;
            hooks.report_progress(Progress::new(len, len));
            Ok(bytes)
        }
        DocumentSource::Path(path) => read_file(&path, hooks).await,
        DocumentSource::Url(url) => fetch_url(&url, hooks, config).await,
        DocumentSource::Transport(transport) => {
            read_transport(transport.as_ref(), hooks, config.chunk_size).await
        }
    }
}

async fn read_file(path: &Path, hooks: &LoadHooks) -> Result<Vec<u8>> {
    let data = tokio::fs::read(path).await?;
    let len = data.len() as u64;
    hooks.report_progress(Progress::new(len, len));
    Ok(data)
}

async fn fetch_url(url: &str, hooks: &LoadHooks, config: &EngineConfig) -> Result<Vec<u8>> {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("file://") {
        return read_file(&file_url_path(url)?, hooks).await;
    }
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return fetch_http(url, hooks, config).await;
    }
    Err(EngineError::UnsupportedSource(format!("unrecognized URL scheme: {url}")))
}

/// Local path named by a `file://` URL.
///
/// Only an empty host or `localhost` is accepted. The path is
/// percent-decoded and any query or fragment is ignored.
fn file_url_path(url: &str) -> Result<PathBuf> {
    let rest = url.get("file://".len()..).unwrap_or_default();
    let (host, path) = match rest.find('/') {
        Some(slash) => rest.split_at(slash),
        None => (rest, ""),
    };
    if !host.is_empty() && !host.eq_ignore_ascii_case("localhost") {
        return Err(EngineError::UnsupportedSource(format!(
            "file URL on remote host {host}: {url}"
        )));
    }

    let path = path.split(['?', '#']).next().unwrap_or_default();
    if path.is_empty() {
        return Err(EngineError::UnsupportedSource(format!("file URL without a path: {url}")));
    }

    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|e| EngineError::UnsupportedSource(format!("{url}: {e}")))?;
    Ok(PathBuf::from(decoded.as_ref()))
}

#[cfg(feature = "http")]
async fn fetch_http(url: &str, hooks: &LoadHooks, config: &EngineConfig) -> Result<Vec<u8>> {
    use futures::StreamExt;

    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(|e| EngineError::Fetch(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| EngineError::Fetch(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(EngineError::Fetch(format!("{url}: HTTP {status}")));
    }

    let total = response.content_length().unwrap_or(0);
    let mut data = Vec::with_capacity(initial_capacity(total, config.chunk_size));
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| EngineError::Fetch(e.to_string()))?;
        data.extend_from_slice(&chunk);
        hooks.report_progress(Progress::new(data.len() as u64, total));
    }

    debug!("Fetched {} bytes from {}", data.len(), url);
    Ok(data)
}

#[cfg(not(feature = "http"))]
async fn fetch_http(url: &str, _hooks: &LoadHooks, _config: &EngineConfig) -> Result<Vec<u8>> {
    Err(EngineError::UnsupportedSource(format!(
        "HTTP support is disabled in this build: {url}"
    )))
}

async fn read_transport(
    transport: &dyn RangeTransport,
    hooks: &LoadHooks,
    chunk_size: usize,
) -> Result<Vec<u8>> {
    let total = transport.length();
    let step = chunk_size.max(1) as u64;
    let mut data = Vec::with_capacity(initial_capacity(total, chunk_size));

    while (data.len() as u64) < total {
        let begin = data.len() as u64;
        let end = begin.saturating_add(step).min(total);
        let chunk = transport.read_range(begin, end).await?;
        if chunk.is_empty() {
            return Err(EngineError::Fetch(format!(
                "transport returned no data at offset {begin}"
            )));
        }

        let wanted = usize::try_from(end - begin).unwrap_or(usize::MAX);
        data.extend_from_slice(&chunk[..chunk.len().min(wanted)]);
        hooks.report_progress(Progress::new(data.len() as u64, total));
    }

    Ok(data)
}

/// Parse the bytes and, for encrypted documents, run the password protocol.
///
/// Unsupported schemes fail before any prompt. The empty user password is
/// tried silently, then every answer from the password hook is checked
/// against the file key until one fits or the attempt limit is reached.
async fn unlock(
    data: Vec<u8>,
    hooks: &LoadHooks,
    config: &EngineConfig,
) -> Result<(Document, bool)> {
    let document = tokio::task::spawn_blocking(move || parse(&data)).await??;

    if !document.is_encrypted() {
        return Ok((document, false));
    }

    let handler = SecurityHandler::from_document(&document)?;
    let key = match handler.key_for(&document, "")? {
        Some(key) => {
            debug!("Empty user password accepted");
            key
        }
        None => request_key(&handler, &document, hooks, config).await?,
    };

    let document = tokio::task::spawn_blocking(move || -> Result<Document> {
        let mut document = document;
        handler.decrypt(&mut document, &key)?;
        Ok(document)
    })
    .await??;

    Ok((document, true))
}

async fn request_key(
    handler: &SecurityHandler,
    document: &Document,
    hooks: &LoadHooks,
    config: &EngineConfig,
) -> Result<Vec<u8>> {
    let mut reason = PasswordReason::NeedPassword;
    let mut attempts: u32 = 0;

    loop {
        if config.max_password_attempts.is_some_and(|max| attempts >= max) {
            return Err(if attempts == 0 {
                EngineError::PasswordRequired
            } else {
                EngineError::IncorrectPassword { attempts }
            });
        }

        let password = hooks.request_password(reason).await?;
        attempts += 1;

        match handler.key_for(document, &password)? {
            Some(key) => {
                debug!(attempts, "password accepted");
                return Ok(key);
            }
            None => {
                trace!(attempts, "password rejected");
                reason = PasswordReason::IncorrectPassword;
            }
        }
    }
}

fn parse(data: &[u8]) -> Result<Document> {
    Document::load_mem(data).map_err(|e| EngineError::Parse(e.to_string()))
}

/// A document opened by [`LopdfEngine`].
pub struct LopdfDocument {
    document: Arc<Document>,
    page_count: u32,
    content_length: u64,
    encrypted: bool,
    fingerprint: Option<String>,
}

impl LopdfDocument {
    fn new(document: Document, content_length: u64, encrypted: bool) -> Self {
        let page_count = document.get_pages().len() as u32;
        let fingerprint = catalog::fingerprint(&document);
        Self {
            document: Arc::new(document),
            page_count,
            content_length,
            encrypted,
            fingerprint,
        }
    }

    /// Run a catalog read on the blocking pool.
    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Document) -> Result<T> + Send + 'static,
    {
        let document = self.document.clone();
        tokio::task::spawn_blocking(move || f(&document)).await?
    }
}

impl fmt::Debug for LopdfDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LopdfDocument")
            .field("page_count", &self.page_count)
            .field("content_length", &self.content_length)
            .field("encrypted", &self.encrypted)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

#[async_trait]
impl DocumentHandle for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn fingerprint(&self) -> Option<String> {
        self.fingerprint.clone()
    }

    async fn metadata(&self) -> Result<DocumentMetadata> {
        let content_length = self.content_length;
        let encrypted = self.encrypted;
        self.read(move |doc| catalog::metadata(doc, encrypted, content_length))
            .await
    }

    async fn attachments(&self) -> Result<BTreeMap<String, Attachment>> {
        self.read(catalog::attachments).await
    }

    async fn javascript(&self) -> Result<Vec<String>> {
        self.read(catalog::javascript).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, Fixture};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct MemoryTransport {
        data: Vec<u8>,
        reads: Mutex<Vec<(u64, u64)>>,
    }

    #[async_trait]
    impl RangeTransport for MemoryTransport {
        fn length(&self) -> u64 {
            self.data.len() as u64
        }

        async fn read_range(&self, begin: u64, end: u64) -> Result<Vec<u8>> {
            self.reads.lock().unwrap().push((begin, end));
            Ok(self.data[begin as usize..end as usize].to_vec())
        }
    }

    fn recording_hooks() -> (LoadHooks, Arc<Mutex<Vec<Progress>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let hooks = LoadHooks::new().with_progress(Arc::new(move |p| sink.lock().unwrap().push(p)));
        (hooks, events)
    }

    #[tokio::test]
    async fn test_open_bytes() {
        let bytes = fixtures::build(&Fixture::new().pages(3).title("Quarterly Report"));
        let len = bytes.len() as u64;
        let (hooks, events) = recording_hooks();

        let engine = LopdfEngine::default();
        let handle = engine.open(bytes.into(), hooks).await.unwrap();

        assert_eq!(handle.page_count(), 3);
        assert_eq!(*events.lock().unwrap(), vec![Progress::new(len, len)]);

        let metadata = handle.metadata().await.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Quarterly Report"));
        assert_eq!(metadata.content_length, Some(len));
        assert!(!metadata.is_encrypted);
    }

    #[tokio::test]
    async fn test_open_transport_in_chunks() {
        let bytes = fixtures::build(&Fixture::new().pages(1));
        let total = bytes.len() as u64;
        let transport = Arc::new(MemoryTransport {
            data: bytes,
            reads: Mutex::new(Vec::new()),
        });
        let (hooks, events) = recording_hooks();

        let engine = LopdfEngine::new(EngineConfig::default().with_chunk_size(100));
        let source = DocumentSource::Transport(transport.clone());
        let handle = engine.open(source, hooks).await.unwrap();
        assert_eq!(handle.page_count(), 1);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), total.div_ceil(100) as usize);
        assert!(events.windows(2).all(|w| w[0].loaded < w[1].loaded));
        assert_eq!(events.last().copied(), Some(Progress::new(total, total)));
        assert_eq!(transport.reads.lock().unwrap()[0], (0, 100));
    }

    #[tokio::test]
    async fn test_open_path_and_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, fixtures::build(&Fixture::new().pages(2))).unwrap();

        let engine = LopdfEngine::default();
        let by_path = engine
            .open(DocumentSource::Path(path.clone()), LoadHooks::new())
            .await
            .unwrap();
        assert_eq!(by_path.page_count(), 2);

        let url = format!("file://{}", path.display());
        let by_url = engine
            .open(DocumentSource::Url(url), LoadHooks::new())
            .await
            .unwrap();
        assert_eq!(by_url.page_count(), 2);
    }

    #[tokio::test]
    async fn test_open_garbage_fails_to_parse() {
        let engine = LopdfEngine::default();
        let result = engine
            .open(b"definitely not a pdf".as_slice().into(), LoadHooks::new())
            .await;
        assert!(matches!(result, Err(EngineError::Parse(_))));
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let engine = LopdfEngine::default();
        let result = engine
            .open(
                DocumentSource::Path(PathBuf::from("/nonexistent/pdfload/missing.pdf")),
                LoadHooks::new(),
            )
            .await;
        assert!(matches!(result, Err(EngineError::Io(_))));
    }

    #[tokio::test]
    async fn test_unknown_url_scheme() {
        let engine = LopdfEngine::default();
        let result = engine
            .open(DocumentSource::Url("ftp://example.com/a.pdf".into()), LoadHooks::new())
            .await;
        assert!(matches!(result, Err(EngineError::UnsupportedSource(_))));
    }

    #[tokio::test]
    async fn test_unencrypted_document_never_prompts() {
        let prompts = Arc::new(Mutex::new(0));
        let counter = prompts.clone();
        let hooks = LoadHooks::new().with_password(Arc::new(move |responder, _| {
            *counter.lock().unwrap() += 1;
            responder.supply("unused");
        }));

        let engine = LopdfEngine::default();
        let bytes = fixtures::build(&Fixture::new());
        engine.open(bytes.into(), hooks).await.unwrap();

        assert_eq!(*prompts.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fingerprint_from_trailer_id() {
        let bytes = fixtures::build(&Fixture::new().id(b"\x01\xab\xff"));
        let handle = LopdfEngine::default()
            .open(bytes.into(), LoadHooks::new())
            .await
            .unwrap();
        assert_eq!(handle.fingerprint().as_deref(), Some("01abff"));
    }

    /// Hooks answering every request with `password`, recording the reasons.
    fn answering(password: &'static str) -> (LoadHooks, Arc<Mutex<Vec<PasswordReason>>>) {
        let reasons = Arc::new(Mutex::new(Vec::new()));
        let seen = reasons.clone();
        let hooks = LoadHooks::new().with_password(Arc::new(move |responder, reason| {
            seen.lock().unwrap().push(reason);
            responder.supply(password);
        }));
        (hooks, reasons)
    }

    #[tokio::test]
    async fn test_encrypted_opens_with_correct_password() {
        let bytes = fixtures::build(
            &Fixture::new()
                .pages(2)
                .title("Payroll")
                .attachment("sheet", "payroll.csv", b"name,amount\n")
                .encrypted("s3cret"),
        );
        let (hooks, reasons) = answering("s3cret");

        let handle = LopdfEngine::default().open(bytes.into(), hooks).await.unwrap();

        assert_eq!(*reasons.lock().unwrap(), vec![PasswordReason::NeedPassword]);
        assert_eq!(handle.page_count(), 2);

        let metadata = handle.metadata().await.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Payroll"));
        assert!(metadata.is_encrypted);

        let attachments = handle.attachments().await.unwrap();
        assert_eq!(attachments["sheet"].filename, "payroll.csv");
        assert_eq!(attachments["sheet"].content, b"name,amount\n");
    }

    #[tokio::test]
    async fn test_empty_user_password_opens_without_prompt() {
        let bytes = fixtures::build(&Fixture::new().title("Owner only").encrypted(""));
        let (hooks, reasons) = answering("unused");

        let handle = LopdfEngine::default().open(bytes.into(), hooks).await.unwrap();

        assert!(reasons.lock().unwrap().is_empty());
        let metadata = handle.metadata().await.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Owner only"));
    }

    #[tokio::test]
    async fn test_wrong_password_stops_at_attempt_limit() {
        let bytes = fixtures::build(&Fixture::new().encrypted("s3cret"));
        let (hooks, reasons) = answering("guess");

        let engine = LopdfEngine::new(EngineConfig::default().with_max_password_attempts(3));
        let result = engine.open(bytes.into(), hooks).await;

        assert!(matches!(result, Err(EngineError::IncorrectPassword { attempts: 3 })));
        assert_eq!(
            *reasons.lock().unwrap(),
            vec![
                PasswordReason::NeedPassword,
                PasswordReason::IncorrectPassword,
                PasswordReason::IncorrectPassword,
            ]
        );
    }

    #[tokio::test]
    async fn test_encrypted_without_handler_requires_password() {
        let bytes = fixtures::build(&Fixture::new().encrypted("s3cret"));
        let result = LopdfEngine::default().open(bytes.into(), LoadHooks::new()).await;
        assert!(matches!(result, Err(EngineError::PasswordRequired)));
    }

    #[tokio::test]
    async fn test_unsupported_encryption_fails_without_prompt() {
        let bytes = fixtures::build(&Fixture::new().aes256_encrypted());
        let (hooks, reasons) = answering("anything");

        let result = LopdfEngine::default().open(bytes.into(), hooks).await;

        assert!(matches!(result, Err(EngineError::UnsupportedEncryption(_))));
        assert!(reasons.lock().unwrap().is_empty());
    }

    struct BogusLengthTransport;

    #[async_trait]
    impl RangeTransport for BogusLengthTransport {
        fn length(&self) -> u64 {
            u64::MAX
        }

        async fn read_range(&self, begin: u64, _end: u64) -> Result<Vec<u8>> {
            // A few bytes, then nothing.
            Ok(if begin == 0 { b"%PDF-".to_vec() } else { Vec::new() })
        }
    }

    #[tokio::test]
    async fn test_transport_with_bogus_length_fails_cleanly() {
        let (hooks, events) = recording_hooks();
        let source = DocumentSource::Transport(Arc::new(BogusLengthTransport));

        let result = LopdfEngine::default().open(source, hooks).await;

        assert!(matches!(result, Err(EngineError::Fetch(_))));
        assert_eq!(*events.lock().unwrap(), vec![Progress::new(5, u64::MAX)]);
    }

    #[test]
    fn test_initial_capacity_is_bounded() {
        assert_eq!(initial_capacity(u64::MAX, 1024), 16 * 1024);
        assert_eq!(initial_capacity(100, 1024), 100);
        assert_eq!(initial_capacity(0, 0), 0);
    }

    #[test]
    fn test_file_url_path() {
        assert_eq!(
            file_url_path("file:///tmp/My%20Docs/a.pdf").unwrap(),
            PathBuf::from("/tmp/My Docs/a.pdf")
        );
        assert_eq!(
            file_url_path("file://localhost/tmp/a.pdf?page=2").unwrap(),
            PathBuf::from("/tmp/a.pdf")
        );
        assert!(matches!(
            file_url_path("file://fileserver/share/a.pdf"),
            Err(EngineError::UnsupportedSource(_))
        ));
        assert!(file_url_path("file://").is_err());
    }

    #[tokio::test]
    async fn test_open_percent_encoded_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annual report.pdf");
        std::fs::write(&path, fixtures::build(&Fixture::new().pages(4))).unwrap();

        let url = format!("file://localhost{}", path.display()).replace(' ', "%20");
        let handle = LopdfEngine::default()
            .open(DocumentSource::Url(url), LoadHooks::new())
            .await
            .unwrap();
        assert_eq!(handle.page_count(), 4);
    }

    /// Serve one canned HTTP response on a local port.
    #[cfg(feature = "http")]
    async fn serve_once(head: String, body: Vec<u8>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = socket.read(&mut buf).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }

            socket.write_all(head.as_bytes()).await.unwrap();
            for part in body.chunks(256) {
                socket.write_all(part).await.unwrap();
                socket.flush().await.unwrap();
            }
            socket.shutdown().await.unwrap();
        });

        format!("http://{addr}/doc.pdf")
    }

    #[cfg(feature = "http")]
    #[tokio::test]
    async fn test_fetch_http_reports_content_length() {
        let body = fixtures::build(&Fixture::new().pages(3).title("Remote"));
        let len = body.len() as u64;
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n"
        );
        let url = serve_once(head, body).await;
        let (hooks, events) = recording_hooks();

        let handle = LopdfEngine::default()
            .open(DocumentSource::Url(url), hooks)
            .await
            .unwrap();
        assert_eq!(handle.page_count(), 3);

        let events = events.lock().unwrap();
        assert!(!events.is_empty());
        assert!(events.iter().all(|p| p.total == len));
        assert!(events.windows(2).all(|w| w[0].loaded < w[1].loaded));
        assert_eq!(events.last().copied(), Some(Progress::new(len, len)));
    }

    #[cfg(feature = "http")]
    #[tokio::test]
    async fn test_fetch_http_without_length_reports_zero_total() {
        let body = fixtures::build(&Fixture::new().pages(1));
        let len = body.len() as u64;
        let head = "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n".to_string();
        let url = serve_once(head, body).await;
        let (hooks, events) = recording_hooks();

        LopdfEngine::default()
            .open(DocumentSource::Url(url), hooks)
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert!(events.iter().all(|p| p.total == 0));
        assert_eq!(events.last().copied(), Some(Progress::new(len, 0)));
    }

    #[cfg(feature = "http")]
    #[tokio::test]
    async fn test_fetch_http_error_status() {
        let head = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        let url = serve_once(head.to_string(), Vec::new()).await;

        let result = LopdfEngine::default()
            .open(DocumentSource::Url(url), LoadHooks::new())
            .await;

        match result {
            Err(EngineError::Fetch(message)) => assert!(message.contains("404")),
            other => panic!("expected a fetch error, got {other:?}"),
        }
    }
}
