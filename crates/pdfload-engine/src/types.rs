//! Values exchanged across the engine boundary.

use serde::Serialize;
use std::collections::BTreeMap;

/// A progress notification from a loading task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Bytes received so far.
    pub loaded: u64,
    /// Expected total, 0 when unknown.
    pub total: u64,
}

impl Progress {
    pub fn new(loaded: u64, total: u64) -> Self {
        Self { loaded, total }
    }
}

/// Why the engine is asking for a password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PasswordReason {
    /// The document is encrypted and no password has been tried yet.
    NeedPassword,
    /// The previously supplied password was rejected.
    IncorrectPassword,
}

impl std::fmt::Display for PasswordReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordReason::NeedPassword => write!(f, "password required"),
            PasswordReason::IncorrectPassword => write!(f, "incorrect password"),
        }
    }
}

/// Document-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentMetadata {
    /// Header version, e.g. "1.7".
    pub pdf_format_version: String,

    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,

    /// Non-standard `/Info` entries.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, String>,

    /// Raw XMP packet from the catalog, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xmp: Option<String>,

    pub is_encrypted: bool,
    pub is_linearized: bool,
    pub is_acroform_present: bool,
    pub is_collection_present: bool,

    /// Size of the source in bytes.
    pub content_length: Option<u64>,
}

/// A file embedded in the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip)]
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn size(&self) -> usize {
        self.content.len()
    }
}
