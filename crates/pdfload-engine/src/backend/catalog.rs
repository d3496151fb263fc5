//! Catalog reads over a parsed lopdf document: info dictionary, XMP,
//! embedded files and document JavaScript.

use std::collections::{BTreeMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::types::{Attachment, DocumentMetadata};
use crate::Result;

/// Nesting limit for name trees.
const MAX_TREE_DEPTH: usize = 32;

pub(crate) fn metadata(doc: &Document, encrypted: bool, content_length: u64) -> Result<DocumentMetadata> {
    let mut metadata = DocumentMetadata {
        pdf_format_version: doc.version.clone(),
        is_encrypted: encrypted,
        content_length: Some(content_length),
        ..Default::default()
    };

    if let Ok(info) = doc.trailer.get(b"Info") {
        let info = resolve_dict(doc, info)
            .ok_or_else(|| EngineError::Metadata("trailer /Info is not a dictionary".to_string()))?;

        for (key, value) in info.iter() {
            let Some(text) = text_value(doc, value) else {
                continue;
            };
            match key.as_slice() {
                b"Title" => metadata.title = Some(text),
                b"Author" => metadata.author = Some(text),
                b"Subject" => metadata.subject = Some(text),
                b"Keywords" => metadata.keywords = Some(text),
                b"Creator" => metadata.creator = Some(text),
                b"Producer" => metadata.producer = Some(text),
                b"CreationDate" => metadata.creation_date = Some(text),
                b"ModDate" => metadata.modification_date = Some(text),
                other => {
                    metadata
                        .custom
                        .insert(String::from_utf8_lossy(other).into_owned(), text);
                }
            }
        }
    }

    let catalog = doc
        .catalog()
        .map_err(|e| EngineError::Metadata(format!("missing catalog: {e}")))?;

    if let Ok(xmp) = catalog.get(b"Metadata") {
        metadata.xmp = stream_text(doc, xmp);
    }
    metadata.is_acroform_present = catalog.has(b"AcroForm");
    metadata.is_collection_present = catalog.has(b"Collection");
    metadata.is_linearized = doc.objects.values().any(|object| {
        matches!(object, Object::Dictionary(dict) if dict.has(b"Linearized"))
    });

    debug!(
        "Metadata: version={}, {} custom entries, xmp={}",
        metadata.pdf_format_version,
        metadata.custom.len(),
        metadata.xmp.is_some()
    );
    Ok(metadata)
}

pub(crate) fn attachments(doc: &Document) -> Result<BTreeMap<String, Attachment>> {
    let mut files = BTreeMap::new();
    let Some(tree) = name_tree_root(doc, b"EmbeddedFiles").map_err(EngineError::Attachments)? else {
        return Ok(files);
    };

    let mut leaves = Vec::new();
    collect_leaves(doc, tree, 0, &mut HashSet::new(), &mut leaves)
        .map_err(EngineError::Attachments)?;

    for (key, value) in leaves {
        let Some(spec) = resolve_dict(doc, value) else {
            warn!("Embedded file {:?} has no file specification", key);
            continue;
        };

        let filename = ["UF", "F"]
            .iter()
            .find_map(|k| spec.get(k.as_bytes()).ok().and_then(|v| text_value(doc, v)))
            .unwrap_or_else(|| key.clone());
        let description = spec.get(b"Desc").ok().and_then(|v| text_value(doc, v));

        let Some(content) = spec
            .get(b"EF")
            .ok()
            .and_then(|ef| resolve_dict(doc, ef))
            .and_then(|ef| ef.get(b"UF").or_else(|_| ef.get(b"F")).ok())
            .and_then(|stream| stream_bytes(doc, stream))
        else {
            warn!("Embedded file {:?} has no content stream", key);
            continue;
        };

        files.insert(
            key,
            Attachment {
                filename,
                description,
                content,
            },
        );
    }

    debug!("Found {} embedded files", files.len());
    Ok(files)
}

pub(crate) fn javascript(doc: &Document) -> Result<Vec<String>> {
    let mut scripts = Vec::new();

    if let Some(tree) = name_tree_root(doc, b"JavaScript").map_err(EngineError::JavaScript)? {
        let mut leaves = Vec::new();
        collect_leaves(doc, tree, 0, &mut HashSet::new(), &mut leaves)
            .map_err(EngineError::JavaScript)?;

        for (key, action) in leaves {
            match resolve_dict(doc, action).and_then(|action| javascript_action(doc, action)) {
                Some(script) => scripts.push(script),
                None => debug!("Skipping non-JavaScript name tree entry {:?}", key),
            }
        }
    }

    let catalog = doc
        .catalog()
        .map_err(|e| EngineError::JavaScript(format!("missing catalog: {e}")))?;
    if let Some(script) = catalog
        .get(b"OpenAction")
        .ok()
        .and_then(|action| resolve_dict(doc, action))
        .and_then(|action| javascript_action(doc, action))
    {
        scripts.push(script);
    }

    debug!("Found {} document scripts", scripts.len());
    Ok(scripts)
}

/// Hex of the first trailer `/ID` string.
pub(crate) fn fingerprint(doc: &Document) -> Option<String> {
    let ids = doc.trailer.get(b"ID").ok()?;
    let (_, ids) = doc.dereference(ids).ok()?;
    let first = ids.as_array().ok()?.first()?;
    match doc.dereference(first).ok()? {
        (_, Object::String(bytes, _)) if !bytes.is_empty() => {
            Some(bytes.iter().map(|b| format!("{b:02x}")).collect())
        }
        _ => None,
    }
}

/// Decode a PDF text string.
///
/// UTF-16BE and UTF-8 are recognized by their byte order marks; anything else
/// is PDFDocEncoding, read as Latin-1.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        return char::decode_utf16(units)
            .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn name_tree_root<'a>(doc: &'a Document, tree: &[u8]) -> std::result::Result<Option<&'a Object>, String> {
    let catalog = doc.catalog().map_err(|e| format!("missing catalog: {e}"))?;
    let Ok(names) = catalog.get(b"Names") else {
        return Ok(None);
    };
    let names = resolve_dict(doc, names).ok_or("catalog /Names is not a dictionary")?;
    Ok(names.get(tree).ok())
}

fn collect_leaves<'a>(
    doc: &'a Document,
    node: &'a Object,
    depth: usize,
    visited: &mut HashSet<ObjectId>,
    out: &mut Vec<(String, &'a Object)>,
) -> std::result::Result<(), String> {
    if depth > MAX_TREE_DEPTH {
        return Err("name tree is nested too deeply".to_string());
    }

    let (id, node) = doc
        .dereference(node)
        .map_err(|e| format!("broken name tree reference: {e}"))?;
    if let Some(id) = id {
        if !visited.insert(id) {
            return Err(format!("name tree cycle at object {} {}", id.0, id.1));
        }
    }
    let node = node.as_dict().map_err(|_| "name tree node is not a dictionary".to_string())?;

    if let Ok(names) = node.get(b"Names") {
        let (_, names) = doc
            .dereference(names)
            .map_err(|e| format!("broken /Names reference: {e}"))?;
        let names = names
            .as_array()
            .map_err(|_| "/Names is not an array".to_string())?;

        for pair in names.chunks(2) {
            let [key, value] = pair else {
                return Err("/Names has an odd number of entries".to_string());
            };
            let key = text_value(doc, key).ok_or("name tree key is not a string")?;
            out.push((key, value));
        }
    }

    if let Ok(kids) = node.get(b"Kids") {
        let (_, kids) = doc
            .dereference(kids)
            .map_err(|e| format!("broken /Kids reference: {e}"))?;
        let kids = kids.as_array().map_err(|_| "/Kids is not an array".to_string())?;
        for kid in kids {
            collect_leaves(doc, kid, depth + 1, visited, out)?;
        }
    }

    Ok(())
}

fn javascript_action(doc: &Document, action: &Dictionary) -> Option<String> {
    let kind = action.get(b"S").ok()?;
    if doc.dereference(kind).ok()?.1.as_name().ok()? != b"JavaScript" {
        return None;
    }
    let js = action.get(b"JS").ok()?;
    match doc.dereference(js).ok()?.1 {
        Object::Stream(_) => stream_text(doc, js),
        other => text_value(doc, other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    doc.dereference(object).ok()?.1.as_dict().ok()
}

fn text_value(doc: &Document, object: &Object) -> Option<String> {
    match doc.dereference(object).ok()?.1 {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

fn stream_bytes(doc: &Document, object: &Object) -> Option<Vec<u8>> {
    match doc.dereference(object).ok()?.1 {
        Object::Stream(stream) => Some(
            stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone()),
        ),
        _ => None,
    }
}

fn stream_text(doc: &Document, object: &Object) -> Option<String> {
    stream_bytes(doc, object).map(|bytes| decode_text(&bytes))
}
