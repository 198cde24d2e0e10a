#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use texproof::analysis::{AnalysisError, AnalysisOutput, AnalyzedPage, DocumentAnalyzer};
use texproof::cache::CacheStore;
use texproof::config::CacheConfig;
use texproof::page_split::{page_file_name, DocumentInfo, PageSplitter};
use texproof::PageUnit;

pub async fn open_store(dir: &Path) -> Arc<CacheStore> {
    Arc::new(CacheStore::open(&CacheConfig::at(dir)).await.unwrap())
}

/// Analyzer that counts calls. Page bytes `FAIL` fail, `BLANK` yield no text,
/// anything else yields a line naming the file.
#[derive(Default)]
pub struct CountingAnalyzer {
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<u8>>>,
}

impl CountingAnalyzer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// How many times these exact bytes were analysed.
    pub fn calls_for(&self, bytes: &[u8]) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.as_slice() == bytes)
            .count()
    }
}

#[async_trait]
impl DocumentAnalyzer for CountingAnalyzer {
    fn name(&self) -> &str {
        "counting"
    }

    async fn analyze(
        &self,
        document: &[u8],
        file_name: &str,
    ) -> Result<AnalysisOutput, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(document.to_vec());
        match document {
            b"FAIL" => Err(AnalysisError::Transient("service unavailable".to_string())),
            b"BLANK" => Ok(AnalysisOutput::default()),
            _ => Ok(AnalysisOutput::from_pages(vec![AnalyzedPage {
                page_number: 1,
                text: format!("text of {} ({} bytes)", file_name, document.len()),
            }])),
        }
    }
}

/// Splits on `|`: `b"a|b|c"` has three pages.
pub struct PipeSplitter;

impl PageSplitter for PipeSplitter {
    fn describe(&self, document: &[u8]) -> DocumentInfo {
        DocumentInfo {
            page_count: document.split(|b| *b == b'|').count(),
            ..DocumentInfo::default()
        }
    }

    fn split(&self, document: &[u8], source_name: &str) -> Vec<PageUnit> {
        document
            .split(|b| *b == b'|')
            .enumerate()
            .map(|(i, bytes)| {
                let page_number = i as u32 + 1;
                PageUnit {
                    page_number,
                    bytes: bytes.to_vec(),
                    source_file_name: source_name.to_string(),
                    page_file_name: page_file_name(source_name, page_number),
                }
            })
            .collect()
    }
}

/// A real multi-page PDF with one line of text per page.
pub fn build_pdf(page_texts: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in page_texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_texts.len() as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}
