//! # PM Copilot CLI (`pmc`)
//!
//! The `pmc` binary is the primary interface for PM Copilot. It provides
//! commands for ingesting product documents into the vector index, asking
//! questions interactively, one-shot search, index statistics, and starting
//! the HTTP API server.
//!
//! ## Usage
//!
//! ```bash
//! pmc --config ./config/pmcopilot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pmc ingest` | Load, chunk, embed, and upload the document folders |
//! | `pmc chat` | Interactive chat REPL against the index |
//! | `pmc search "<query>"` | One-shot similarity search |
//! | `pmc stats` | Print vector index statistics |
//! | `pmc serve` | Start the HTTP JSON API |
//!
//! ## Examples
//!
//! ```bash
//! # Preview what an ingest run would upload
//! pmc ingest --dry-run
//!
//! # Ingest the prds/, sprints/, and roadmaps/ folders
//! pmc ingest --config ./config/pmcopilot.toml
//!
//! # Ask questions interactively
//! pmc chat
//!
//! # Retrieval only, ten matches
//! pmc search "onboarding KPIs" --k 10
//!
//! # Start the API for the web UI
//! pmc serve
//! ```
//!
//! Credentials are read from the environment: `PINECONE_API_KEY` for the
//! vector index and `OPENAI_API_KEY` for embeddings and generation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pm_copilot::{chat_cmd, config, ingest, search, server, stats};

/// PM Copilot CLI — retrieval-augmented Q&A over product documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file runs on the built-in defaults; credentials always
/// come from the environment.
#[derive(Parser)]
#[command(
    name = "pmc",
    about = "PM Copilot — retrieval-augmented Q&A over PRDs, sprint plans, and roadmaps",
    version,
    long_about = "PM Copilot ingests PRDs, sprint plans, and roadmaps from three local folders, \
    chunks and embeds them into a Pinecone index, and answers questions grounded in the \
    retrieved chunks via an interactive REPL and an HTTP JSON API with per-session memory."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/pmcopilot.toml`. Index, folder, chunking,
    /// upload, retrieval, model, and server settings are read from this
    /// file; unset sections fall back to the defaults.
    #[arg(long, global = true, default_value = "./config/pmcopilot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest the document folders into the vector index.
    ///
    /// Scans `prds/`, `sprints/`, and `roadmaps/` under the configured base
    /// path, chunks the documents, embeds each batch, and upserts the
    /// vectors with pacing between batches. Prints a summary of documents,
    /// skips, chunks, and upload counts.
    Ingest {
        /// Show document and chunk counts without uploading.
        #[arg(long)]
        dry_run: bool,
    },

    /// Interactive chat REPL against the index.
    ///
    /// Keeps an in-process conversation memory for the session. Inside the
    /// loop, `history`, `clear`, `stats`, and `quit`/`exit` are commands;
    /// anything else is asked to the agent.
    Chat,

    /// One-shot similarity search.
    ///
    /// Embeds the query, fetches the top matches, and prints them ranked
    /// with scores and source metadata. No generation, no memory.
    Search {
        /// The search query string.
        query: String,

        /// Number of matches to return.
        #[arg(long, default_value_t = 5)]
        k: usize,
    },

    /// Print vector index statistics.
    ///
    /// Shows the index name, vector count, dimension, fullness, and
    /// per-namespace breakdown.
    Stats,

    /// Start the HTTP JSON API.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// chat, search, stats, and history endpoints for the web UI.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Ingest { dry_run } => {
            ingest::run_ingest(&cfg, dry_run).await?;
        }
        Commands::Chat => {
            chat_cmd::run_chat(&cfg).await?;
        }
        Commands::Search { query, k } => {
            search::run_search(&cfg, &query, k).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
