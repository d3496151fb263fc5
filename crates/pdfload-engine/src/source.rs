//! Document sources.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

/// Random-access byte provider for documents that are streamed in ranges.
#[async_trait]
pub trait RangeTransport: Send + Sync {
    /// Total length of the document in bytes.
    fn length(&self) -> u64;

    /// Read bytes `begin..end`.
    async fn read_range(&self, begin: u64, end: u64) -> Result<Vec<u8>>;
}

/// Where a document comes from.
#[derive(Clone)]
pub enum DocumentSource {
    /// A URL (`http://`, `https://` or `file://`).
    Url(String),
    /// Document bytes already in memory.
    Bytes(Vec<u8>),
    /// A local file.
    Path(PathBuf),
    /// A caller-provided range transport.
    Transport(Arc<dyn RangeTransport>),
}

impl DocumentSource {
    /// Interpret a command-line style argument: URLs stay URLs, everything
    /// else is a path.
    pub fn parse(input: &str) -> Self {
        let lower = input.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("file://")
        {
            DocumentSource::Url(input.to_string())
        } else {
            DocumentSource::Path(PathBuf::from(input))
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            DocumentSource::Url(url) => url.clone(),
            DocumentSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            DocumentSource::Path(path) => path.display().to_string(),
            DocumentSource::Transport(transport) => {
                format!("<transport, {} bytes>", transport.length())
            }
        }
    }
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentSource({})", self.describe())
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(bytes: Vec<u8>) -> Self {
        DocumentSource::Bytes(bytes)
    }
}

impl From<&[u8]> for DocumentSource {
    fn from(bytes: &[u8]) -> Self {
        DocumentSource::Bytes(bytes.to_vec())
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(path: PathBuf) -> Self {
        DocumentSource::Path(path)
    }
}

impl From<Arc<dyn RangeTransport>> for DocumentSource {
    fn from(transport: Arc<dyn RangeTransport>) -> Self {
        DocumentSource::Transport(transport)
    }
}
