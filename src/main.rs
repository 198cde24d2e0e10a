//! # texproof CLI
//!
//! ```bash
//! texproof --config ./config/texproof.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `texproof init` | Create the cache directories and metadata index |
//! | `texproof describe <pdf>` | Page count and document metadata |
//! | `texproof analyze <pdf>...` | Extract page text, using the cache where possible |
//! | `texproof chunk <tex>...` | Split LaTeX sources into chunks |
//! | `texproof compare <tex>` | Run several chunking modes side by side |
//! | `texproof cache stats` | Per-level cache statistics |
//! | `texproof cache recommend` | Cleanup hints |
//! | `texproof cache list` | Cached entries, newest first |
//! | `texproof cache cleanup` | Evict entries by age, use, or size |
//! | `texproof cache prune` | Repair index/artifact mismatches |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use texproof::{analyze_cmd, cache_cmd, chunk_cmd, config, logging};

/// texproof: cached document analysis and LaTeX chunking.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Commands that only read local files fall back to defaults when the
/// file is missing.
#[derive(Parser)]
#[command(
    name = "texproof",
    about = "Cached document analysis and LaTeX chunking for paper proofreading",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/texproof.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the cache directories and metadata index. Idempotent.
    Init,

    /// Print page count and document-info metadata of a PDF.
    Describe {
        pdf: PathBuf,
    },

    /// Extract page text from PDFs.
    ///
    /// Whole-document and per-page cache hits skip the analysis service.
    Analyze {
        #[arg(required = true)]
        pdfs: Vec<PathBuf>,

        /// Whole-document cache only; one service call per document.
        #[arg(long)]
        legacy: bool,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Split LaTeX sources into chunks.
    Chunk {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// `section`, `command`, `sentence`, `hybrid`, or `recursive`.
        /// Defaults to `chunking.default_mode`.
        #[arg(long)]
        mode: Option<String>,

        /// Print chunks as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Compare chunking modes on one LaTeX source.
    Compare {
        file: PathBuf,

        /// Comma-separated modes (default: all).
        #[arg(long)]
        modes: Option<String>,
    },

    /// Inspect and maintain the analysis cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Per-level entry counts, sizes, and access totals.
    Stats,
    /// Rarely used, large, and stale entry counts with advice.
    Recommend,
    /// List entries, newest first.
    List {
        /// `full_document` or `page`.
        #[arg(long)]
        level: Option<String>,
    },
    /// Remove entries matching ANY of the criteria.
    Cleanup {
        /// Last access older than this many days.
        #[arg(long, default_value_t = 30)]
        days: u32,
        /// Accessed fewer times than this.
        #[arg(long, default_value_t = 1)]
        min_access: u64,
        /// Input larger than this many MB.
        #[arg(long)]
        max_size_mb: Option<f64>,
    },
    /// Drop index rows without artifacts and artifacts without index rows.
    Prune,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_json);

    // Local-only commands work without a config file
    let cfg = match &cli.command {
        Commands::Init
        | Commands::Describe { .. }
        | Commands::Chunk { .. }
        | Commands::Compare { .. }
            if !cli.config.exists() =>
        {
            config::Config::default()
        }
        _ => config::load_config(&cli.config)?,
    };

    match cli.command {
        Commands::Init => {
            let store = texproof::cache::CacheStore::open(&cfg.cache).await?;
            store.close().await;
            println!("Cache initialized at {}.", cfg.cache.dir.display());
        }
        Commands::Describe { pdf } => {
            analyze_cmd::run_describe(&pdf)?;
        }
        Commands::Analyze { pdfs, legacy, json } => {
            analyze_cmd::run_analyze(&cfg, &pdfs, legacy, json).await?;
        }
        Commands::Chunk { files, mode, json } => {
            chunk_cmd::run_chunk(&cfg, &files, mode.as_deref(), json)?;
        }
        Commands::Compare { file, modes } => {
            chunk_cmd::run_compare(&cfg, &file, modes.as_deref())?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Stats => cache_cmd::run_stats(&cfg).await?,
            CacheAction::Recommend => cache_cmd::run_recommend(&cfg).await?,
            CacheAction::List { level } => cache_cmd::run_list(&cfg, level.as_deref()).await?,
            CacheAction::Cleanup {
                days,
                min_access,
                max_size_mb,
            } => cache_cmd::run_cleanup(&cfg, days, min_access, max_size_mb).await?,
            CacheAction::Prune => cache_cmd::run_prune(&cfg).await?,
        },
    }

    Ok(())
}
