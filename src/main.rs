//! # Lexfuse CLI (`lexf`)
//!
//! The `lexf` binary is the command-line interface for Lexfuse. It provides
//! commands for index provisioning, document ingestion, fused retrieval,
//! and grounded question answering.
//!
//! ## Usage
//!
//! ```bash
//! lexf --config ./lexfuse.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lexf init` | Provision the vector and keyword indexes |
//! | `lexf ingest <file>` | Extract, segment, and index a document into both backends |
//! | `lexf search "<query>"` | Fused hybrid retrieval, printed as ranked evidence |
//! | `lexf ask "<question>"` | Retrieve evidence and generate a grounded answer |
//!
//! ## Examples
//!
//! ```bash
//! # Provision both indexes
//! lexf init --config ./lexfuse.toml
//!
//! # Ingest a lease agreement
//! lexf ingest lease.pdf --config ./lexfuse.toml
//!
//! # Fused retrieval with an explicit semantic weight
//! lexf search "article 14 termination" --alpha 0.8 --k 10
//!
//! # Grounded question answering
//! lexf ask "what is the notice period for termination?"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use lexfuse::answer::AnswerPipeline;
use lexfuse::config::{self, Config};
use lexfuse::embedding::create_embedder;
use lexfuse::extract::extract_file;
use lexfuse::fusion::FusionEngine;
use lexfuse::generate::create_generator;
use lexfuse::ingest::DualIndexer;
use lexfuse::models::FusedHit;
use lexfuse::store_elastic::ElasticStore;
use lexfuse::store_pinecone::PineconeStore;
use lexfuse::traits::{Embedder, KeywordStore, Metric, VectorStore};

/// Lexfuse CLI — hybrid retrieval over legal documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `lexfuse.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lexf",
    about = "Lexfuse — hybrid vector + keyword retrieval for legal documents",
    version,
    long_about = "Lexfuse ingests legal documents into a vector index and a keyword index in \
    parallel, then answers queries by fusing both result sets into one ranked evidence list, \
    optionally passed to a chat model for a grounded, page-cited answer."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./lexfuse.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Provision the vector and keyword indexes.
    ///
    /// Creates both indexes if they do not exist. This command is
    /// idempotent — running it multiple times is safe.
    Init,

    /// Ingest a document into both retrieval backends.
    ///
    /// Extracts text (PDF pages, DOCX body, or plain text), normalizes and
    /// segments it into overlapping windows, embeds each chunk, and upserts
    /// into the vector and keyword indexes. Re-ingesting the same file
    /// overwrites prior entries rather than duplicating them.
    Ingest {
        /// Path to the document (pdf, docx, txt, or md).
        file: PathBuf,

        /// Override the source identifier (defaults to the file name).
        #[arg(long)]
        source_id: Option<String>,
    },

    /// Run a fused hybrid retrieval and print ranked evidence.
    Search {
        /// The query string.
        query: String,

        /// Maximum number of evidence items to return.
        #[arg(long)]
        k: Option<usize>,

        /// Semantic weight in [0, 1]: fused = alpha*vector + (1-alpha)*keyword.
        #[arg(long)]
        alpha: Option<f64>,
    },

    /// Retrieve evidence and generate a grounded answer.
    ///
    /// Requires a generation provider to be configured. The answer cites
    /// page labels from the retrieved evidence; when retrieval finds
    /// nothing, no generation call is made.
    Ask {
        /// The question to answer.
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let (embedder, vector, keyword) = build_backends(&cfg)?;
            vector
                .ensure_index(embedder.dims(), Metric::Cosine)
                .await
                .context("Failed to provision vector index")?;
            keyword
                .ensure_index()
                .await
                .context("Failed to provision keyword index")?;
            println!("Indexes provisioned successfully.");
        }
        Commands::Ingest { file, source_id } => {
            let source_id = match source_id {
                Some(id) => id,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| anyhow::anyhow!("Cannot derive source id from path"))?,
            };

            let text = extract_file(&file)?;
            let (embedder, vector, keyword) = build_backends(&cfg)?;
            let indexer = DualIndexer::new(
                embedder,
                vector,
                keyword,
                &cfg.vector_store,
                cfg.keyword_store.batch_size,
            );

            let report = indexer.ingest(&source_id, &text, &cfg.segmenter).await?;
            println!(
                "Ingested '{}': {} pages seen ({} skipped), {} chunks.",
                source_id, report.pages_seen, report.pages_skipped, report.chunks
            );
            println!(
                "Vector batches: {} ok, {} failed. Keyword batches: {} ok, {} failed.",
                report.vector_batches - report.vector_batches_failed,
                report.vector_batches_failed,
                report.keyword_batches - report.keyword_batches_failed,
                report.keyword_batches_failed
            );
            for err in &report.batch_errors {
                println!("  error: {}", err);
            }
        }
        Commands::Search { query, k, alpha } => {
            let engine = build_engine(&cfg, k, alpha)?;
            let hits = engine.fuse(&query).await?;
            print_evidence(&hits);
        }
        Commands::Ask { question } => {
            let engine = build_engine(&cfg, None, None)?;
            let generator = create_generator(&cfg.generation)?;
            let pipeline = AnswerPipeline::new(generator);

            let evidence = engine.fuse(&question).await?;
            let answer = pipeline.answer(&question, &evidence).await?;

            println!("{}", answer.text);
            if let Some(usage) = answer.usage {
                println!(
                    "\n[tokens: {} in, {} out, {} total]",
                    usage.input_tokens, usage.output_tokens, usage.total_tokens
                );
            }
            if !evidence.is_empty() {
                println!("\nEvidence:");
                print_evidence(&evidence);
            }
        }
    }

    Ok(())
}

/// Construct the configured embedder and both store clients.
fn build_backends(
    cfg: &Config,
) -> Result<(Arc<dyn Embedder>, Arc<dyn VectorStore>, Arc<dyn KeywordStore>)> {
    let embedder = create_embedder(&cfg.embedding)?;
    let vector = Arc::new(PineconeStore::new(&cfg.vector_store)?);
    let keyword = Arc::new(ElasticStore::new(&cfg.keyword_store)?);
    Ok((embedder, vector, keyword))
}

/// Construct a fusion engine, applying CLI overrides to the configured
/// retrieval parameters.
fn build_engine(cfg: &Config, k: Option<usize>, alpha: Option<f64>) -> Result<FusionEngine> {
    let mut params = cfg.retrieval.clone();
    if let Some(k) = k {
        anyhow::ensure!(k >= 1, "--k must be >= 1");
        params.final_k = k;
        params.candidate_k_vector = params.candidate_k_vector.max(k);
        params.candidate_k_keyword = params.candidate_k_keyword.max(k);
    }
    if let Some(alpha) = alpha {
        anyhow::ensure!(
            (0.0..=1.0).contains(&alpha),
            "--alpha must be in [0.0, 1.0]"
        );
        params.alpha = alpha;
    }

    let (embedder, vector, keyword) = build_backends(cfg)?;
    Ok(FusionEngine::new(embedder, vector, keyword, params))
}

fn print_evidence(hits: &[FusedHit]) {
    if hits.is_empty() {
        println!("No evidence found.");
        return;
    }
    for (rank, hit) in hits.iter().enumerate() {
        let excerpt: String = hit.metadata.text.chars().take(160).collect();
        println!(
            "{:>2}. [{:.4}] {} (page {})",
            rank + 1,
            hit.fused_score,
            hit.id,
            hit.metadata.page
        );
        println!("    {}", excerpt);
    }
}
