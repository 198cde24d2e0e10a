//! Page decomposition of multi-page PDF documents.
//!
//! A [`PageSplitter`] turns one document into ordered single-page
//! [`PageUnit`]s so each page can be analysed and cached on its own.
//! Splitting never fails outright: if the document cannot be decomposed,
//! the whole document is returned as page 1.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use texproof_core::PageUnit;

/// Why a document could not be decomposed.
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("failed to parse PDF: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("PDF has no pages")]
    NoPages,
    #[error("failed to write page {page}: {reason}")]
    WritePage { page: u32, reason: String },
}

/// Lightweight document description for diagnostics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub metadata: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub trait PageSplitter: Send + Sync {
    /// Page count and document-info metadata. Parse failures are reported in
    /// [`DocumentInfo::error`] with a page count of 0.
    fn describe(&self, document: &[u8]) -> DocumentInfo;

    /// One unit per page, in page order.
    fn split(&self, document: &[u8], source_name: &str) -> Vec<PageUnit>;
}

/// `paper.pdf`, 3 → `paper_page_3.pdf`
pub fn page_file_name(source_name: &str, page_number: u32) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    format!("{}_page_{}.pdf", stem, page_number)
}

/// The whole document as a single page, used when splitting fails.
pub fn whole_document_unit(document: &[u8], source_name: &str) -> PageUnit {
    PageUnit {
        page_number: 1,
        bytes: document.to_vec(),
        source_file_name: source_name.to_string(),
        page_file_name: page_file_name(source_name, 1),
    }
}

/// Splits PDFs with `lopdf`: every page is copied into a fresh single-page
/// document holding only the objects that page references.
///
/// Objects are renumbered in the order they are reached from the page, so
/// the same page cut from two different documents serializes to the same
/// bytes and shares one page-level cache key.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfSplitter;

impl LopdfSplitter {
    pub fn try_split(&self, document: &[u8], source_name: &str) -> Result<Vec<PageUnit>, SplitError> {
        let doc = Document::load_mem(document)?;
        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(SplitError::NoPages);
        }
        let page_ids: HashSet<ObjectId> = pages.values().copied().collect();

        let mut units = Vec::with_capacity(pages.len());
        for (&page, &page_id) in &pages {
            let mut single = extract_page(&doc, page, page_id, &page_ids)?;
            let mut bytes = Vec::new();
            single
                .save_to(&mut bytes)
                .map_err(|e| SplitError::WritePage {
                    page,
                    reason: e.to_string(),
                })?;

            units.push(PageUnit {
                page_number: page,
                bytes,
                source_file_name: source_name.to_string(),
                page_file_name: page_file_name(source_name, page),
            });
        }
        Ok(units)
    }
}

/// Page attributes that may be inherited from the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page tree depth limit; guards against `/Parent` cycles.
const MAX_TREE_DEPTH: usize = 64;

/// Build a standalone document containing only `page_id` and what it uses.
///
/// References to other pages and to page tree nodes are replaced with
/// `null` so nothing else of the source document is dragged along.
fn extract_page(
    doc: &Document,
    page: u32,
    page_id: ObjectId,
    page_ids: &HashSet<ObjectId>,
) -> Result<Document, SplitError> {
    let mut page_dict = doc
        .get_dictionary(page_id)
        .map_err(|e| SplitError::WritePage {
            page,
            reason: e.to_string(),
        })?
        .clone();
    page_dict.remove(b"Parent");
    for key in INHERITABLE {
        if !page_dict.has(key) {
            if let Some(value) = inherited(doc, page_id, key) {
                page_dict.set(key.to_vec(), value);
            }
        }
    }
    let page_object = Object::Dictionary(page_dict);

    let mut out = Document::with_version(doc.version.clone());
    let pages_id = out.new_object_id();
    let new_page_id = out.new_object_id();

    // Breadth-first from the page, assigning new ids in discovery order.
    let mut ids: HashMap<ObjectId, ObjectId> = HashMap::from([(page_id, new_page_id)]);
    let mut copied: Vec<(ObjectId, ObjectId)> = Vec::new();
    let mut queue = VecDeque::new();
    collect_refs(&page_object, &mut queue);
    while let Some(old) = queue.pop_front() {
        if ids.contains_key(&old) || page_ids.contains(&old) || is_page_tree_node(doc, old) {
            continue;
        }
        let Some(object) = doc.objects.get(&old) else {
            continue;
        };
        let new = out.new_object_id();
        ids.insert(old, new);
        copied.push((old, new));
        collect_refs(object, &mut queue);
    }

    let mut new_page = rewrite_refs(&page_object, &ids);
    if let Object::Dictionary(dict) = &mut new_page {
        dict.set("Parent", pages_id);
    }
    out.objects.insert(new_page_id, new_page);
    for (old, new) in copied {
        if let Some(object) = doc.objects.get(&old) {
            out.objects.insert(new, rewrite_refs(object, &ids));
        }
    }
    out.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(new_page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = out.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    out.trailer.set("Root", catalog_id);
    Ok(out)
}

/// Nearest ancestor value of an inheritable page attribute.
fn inherited(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
    }
    None
}

fn is_page_tree_node(doc: &Document, id: ObjectId) -> bool {
    matches!(
        doc.objects.get(&id),
        Some(Object::Dictionary(dict))
            if dict.get(b"Type").and_then(Object::as_name).ok() == Some(b"Pages".as_slice())
    )
}

fn collect_refs(object: &Object, queue: &mut VecDeque<ObjectId>) {
    match object {
        Object::Reference(id) => queue.push_back(*id),
        Object::Array(items) => items.iter().for_each(|item| collect_refs(item, queue)),
        Object::Dictionary(dict) => dict.iter().for_each(|(_, v)| collect_refs(v, queue)),
        Object::Stream(stream) => stream.dict.iter().for_each(|(_, v)| collect_refs(v, queue)),
        _ => {}
    }
}

/// Clone `object` with every reference mapped through `ids`; unmapped
/// references become `null`.
fn rewrite_refs(object: &Object, ids: &HashMap<ObjectId, ObjectId>) -> Object {
    match object {
        Object::Reference(id) => ids
            .get(id)
            .map(|new| Object::Reference(*new))
            .unwrap_or(Object::Null),
        Object::Array(items) => Object::Array(items.iter().map(|i| rewrite_refs(i, ids)).collect()),
        Object::Dictionary(dict) => Object::Dictionary(rewrite_dict(dict, ids)),
        Object::Stream(stream) => {
            let mut stream = stream.clone();
            stream.dict = rewrite_dict(&stream.dict, ids);
            Object::Stream(stream)
        }
        other => other.clone(),
    }
}

fn rewrite_dict(dict: &Dictionary, ids: &HashMap<ObjectId, ObjectId>) -> Dictionary {
    let mut out = Dictionary::new();
    for (key, value) in dict.iter() {
        out.set(key.clone(), rewrite_refs(value, ids));
    }
    out
}

impl PageSplitter for LopdfSplitter {
    fn describe(&self, document: &[u8]) -> DocumentInfo {
        match Document::load_mem(document) {
            Ok(doc) => DocumentInfo {
                page_count: doc.get_pages().len(),
                metadata: info_metadata(&doc),
                error: None,
            },
            Err(e) => DocumentInfo {
                page_count: 0,
                metadata: BTreeMap::new(),
                error: Some(e.to_string()),
            },
        }
    }

    fn split(&self, document: &[u8], source_name: &str) -> Vec<PageUnit> {
        match self.try_split(document, source_name) {
            Ok(units) => {
                tracing::debug!(source = source_name, pages = units.len(), "document split");
                units
            }
            Err(e) => {
                tracing::warn!(
                    source = source_name,
                    error = %e,
                    "page split failed; treating document as a single page"
                );
                vec![whole_document_unit(document, source_name)]
            }
        }
    }
}

/// String entries of the trailer's `/Info` dictionary.
fn info_metadata(doc: &Document) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    if let Some(dict) = info {
        for (key, value) in dict.iter() {
            if let Object::String(bytes, _) = value {
                out.insert(
                    String::from_utf8_lossy(key).into_owned(),
                    decode_pdf_string(bytes),
                );
            }
        }
    }
    out
}

/// PDF text strings are UTF-16BE with a BOM, or PDFDocEncoding (treated as Latin-1).
fn decode_pdf_string(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(utf16) => {
            let units = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
            char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        None => bytes.iter().map(|&b| b as char).collect(),
    }
}
