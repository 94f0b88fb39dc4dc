//! Bid audit binary
//!
//! Reads a JSON array of bid documents, runs the collusion analysis and
//! prints the report as JSON on stdout. Logs go to stderr.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use bid_types::DocumentRecord;
use clap::Parser;
use collusion_engine::detectors::similarity::SimilarityEngine;
use collusion_engine::{AnalysisConfig, CollusionEngine, ProgressUpdate};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "bid-audit")]
#[command(version, about = "Detect collusive bidding across the bids of one tender")]
struct Args {
    /// JSON file holding an array of bid documents
    documents: PathBuf,

    /// TOML analysis configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Word list for CJK segmentation, one word per line
    #[arg(long)]
    lexicon: Option<PathBuf>,

    /// Run dimensions one after another instead of in parallel
    #[arg(long)]
    sequential: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

fn load_documents(path: &Path) -> anyhow::Result<Vec<DocumentRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read documents: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse documents: {}", path.display()))
}

fn load_lexicon(path: &Path) -> anyhow::Result<SimilarityEngine> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read lexicon: {}", path.display()))?;
    let words: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .collect();
    tracing::info!("Loaded {} lexicon entries", words.len());
    Ok(SimilarityEngine::with_lexicon(words))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries the report, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    if args.sequential {
        config.parallel = false;
    }

    let documents = load_documents(&args.documents)?;
    tracing::info!("Loaded {} documents from {}", documents.len(), args.documents.display());

    let mut engine = CollusionEngine::new(config)?;
    if let Some(path) = &args.lexicon {
        engine = engine.with_similarity_engine(load_lexicon(path)?);
    }

    let progress = |update: &ProgressUpdate| {
        tracing::info!(
            "[{}/{}] {} score={:.3}{}",
            update.completed,
            update.total,
            update.dimension,
            update.max_score,
            if update.degraded { " (degraded)" } else { "" }
        );
    };
    let report = engine.analyze_with_progress(&documents, &progress)?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}
