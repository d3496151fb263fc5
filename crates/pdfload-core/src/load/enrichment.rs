//! Post-open enrichment: metadata, attachments and scripts in one record.

use pdfload_engine::DocumentHandle;
use tracing::debug;

use crate::error::{EnrichmentError, EnrichmentStage};
use crate::models::DocumentInfo;

/// Fetch metadata, attachments and embedded scripts, in that order.
///
/// The first failing request fails the whole pipeline.
pub async fn enrich(document: &dyn DocumentHandle) -> Result<DocumentInfo, EnrichmentError> {
    let metadata = document
        .metadata()
        .await
        .map_err(|e| EnrichmentError::new(EnrichmentStage::Metadata, e))?;

    let attachments = document
        .attachments()
        .await
        .map_err(|e| EnrichmentError::new(EnrichmentStage::Attachments, e))?;

    let embedded_scripts = document
        .javascript()
        .await
        .map_err(|e| EnrichmentError::new(EnrichmentStage::JavaScript, e))?;

    debug!(
        "Enriched document: {} attachments, {} scripts",
        attachments.len(),
        embedded_scripts.len()
    );

    Ok(DocumentInfo {
        metadata,
        attachments,
        embedded_scripts,
    })
}
