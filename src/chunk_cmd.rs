//! `texproof chunk` and `texproof compare`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use texproof_core::{chunk_kind, recommend_mode, ChunkingEngine, SourceFile, SplitMode};

use crate::config::Config;

fn read_source(path: &Path) -> Result<SourceFile> {
    let content =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceFile { name, content })
}

/// Parse a comma-separated mode list, e.g. `section,hybrid`.
pub fn parse_modes(list: &str) -> Result<Vec<SplitMode>> {
    list.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| m.parse::<SplitMode>().map_err(anyhow::Error::from))
        .collect()
}

pub fn run_chunk(config: &Config, paths: &[PathBuf], mode: Option<&str>, json: bool) -> Result<()> {
    let mode = match mode {
        Some(m) => m.parse::<SplitMode>()?,
        None => config.chunking.mode()?,
    };
    let files = paths
        .iter()
        .map(|p| read_source(p))
        .collect::<Result<Vec<_>>>()?;

    let engine = ChunkingEngine::new(config.chunking.engine_config());
    let results = engine.split_files(&files, mode)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    for file in &results {
        println!("{} ({} chunks, mode {})", file.name, file.total_chunks, mode);
        println!();
        for chunk in &file.chunks {
            println!(
                "[{}] {} ({} chars)",
                chunk.ordinal,
                chunk_kind(&chunk.text, mode).as_str(),
                chunk.text.chars().count()
            );
            println!("{}", chunk.text);
            println!();
        }
    }
    Ok(())
}

pub fn run_compare(config: &Config, path: &Path, modes: Option<&str>) -> Result<()> {
    let modes = match modes {
        Some(list) => parse_modes(list)?,
        None => SplitMode::ALL.to_vec(),
    };
    let file = read_source(path)?;
    let decoded = texproof_core::text::decode(&file.content);

    let engine = ChunkingEngine::new(config.chunking.engine_config());
    let results = engine.compare(&*decoded.text, &modes);

    println!("{} ({} chars, {})", file.name, decoded.text.chars().count(), decoded.encoding);
    println!();
    println!(
        "  {:<10} {:>7} {:>9} {:>7} {:>7} {:>9}",
        "MODE", "CHUNKS", "AVG", "MIN", "MAX", "TIME"
    );
    println!("  {}", "-".repeat(56));
    for r in &results {
        match &r.error {
            Some(err) => println!("  {:<10} error: {}", r.mode.as_str(), err),
            None => println!(
                "  {:<10} {:>7} {:>9.1} {:>7} {:>7} {:>7.2}ms",
                r.mode.as_str(),
                r.chunk_count,
                r.average_chars,
                r.min_chars,
                r.max_chars,
                r.elapsed_ms
            ),
        }
    }
    println!();
    println!("  Recommended: {}", recommend_mode(&decoded.text));
    Ok(())
}
