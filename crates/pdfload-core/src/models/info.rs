//! Consolidated document information produced by enrichment.

use std::collections::BTreeMap;

use pdfload_engine::{Attachment, DocumentMetadata};
use serde::Serialize;

/// Metadata, attachments and embedded scripts of an opened document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentInfo {
    /// Info dictionary, XMP and document flags.
    pub metadata: DocumentMetadata,

    /// Embedded files keyed by name.
    pub attachments: BTreeMap<String, Attachment>,

    /// Document-level JavaScript, in document order.
    pub embedded_scripts: Vec<String>,
}

impl DocumentInfo {
    /// Total size of all attachments in bytes.
    pub fn attachments_size(&self) -> usize {
        self.attachments.values().map(Attachment::size).sum()
    }
}
