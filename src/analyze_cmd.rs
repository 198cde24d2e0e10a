//! `texproof describe` and `texproof analyze`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::analysis::create_analyzer;
use crate::cache::CacheStore;
use crate::config::Config;
use crate::orchestrator::{DocumentAnalysisOrchestrator, SourceDocument};
use crate::page_split::{LopdfSplitter, PageSplitter};

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn run_describe(path: &Path) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let info = LopdfSplitter.describe(&bytes);
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

pub async fn run_analyze(config: &Config, paths: &[PathBuf], legacy: bool, json: bool) -> Result<()> {
    let documents = paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(SourceDocument {
                name: file_name(path),
                bytes,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if !config.analysis.is_enabled() {
        tracing::warn!("analysis provider is disabled; only cached documents can be answered");
    }
    let analyzer: Arc<dyn crate::analysis::DocumentAnalyzer> =
        Arc::from(create_analyzer(&config.analysis)?);
    let store = Arc::new(CacheStore::open(&config.cache).await?);
    let orchestrator =
        DocumentAnalysisOrchestrator::new(store.clone(), Arc::new(LopdfSplitter), analyzer);

    let results = orchestrator.analyze_batch(&documents, legacy).await;

    let mut failed = 0;
    let mut reports = Vec::new();
    for (doc, result) in documents.iter().zip(results) {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                failed += 1;
                eprintln!("{}: {}", doc.name, e);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            let source = if report.full_document_hit {
                "document cache".to_string()
            } else {
                format!(
                    "{} page hits, {} service calls",
                    report.page_hits, report.external_calls
                )
            };
            println!(
                "{}: {} pages ({}, {:.2}s)",
                report.source_name,
                report.pages.len(),
                source,
                report.elapsed_secs
            );
            for page in &report.pages {
                println!("--- page {} ---", page.page_number);
                println!("{}", page.content);
            }
            println!();
        }
        let session = store.session();
        println!(
            "Cache: {} hits, {} misses, {} service calls avoided.",
            session.hits, session.misses, session.calls_avoided
        );
    }

    store.close().await;
    if failed > 0 && reports.is_empty() {
        anyhow::bail!("no document could be analysed");
    }
    Ok(())
}
