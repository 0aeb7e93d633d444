//! Ingestion pipeline orchestration.
//!
//! Coordinates the one-shot flow: load the source folders, chunk the
//! documents, and batch-upload the chunks to the vector store. Load and
//! upload failures are absorbed into counts; the summary block reports
//! them instead of aborting the run.

use anyhow::{Context, Result};

use crate::chunk::split_documents;
use crate::config::Config;
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::loader::load_documents;
use crate::store::{PineconeStore, VectorStore};
use crate::uploader::{upload_with_fallback, UploadReport};

/// Everything a finished ingest run can report.
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub documents: usize,
    pub files_loaded: usize,
    pub files_skipped: usize,
    pub folders_missing: usize,
    pub chunks: usize,
    pub report: UploadReport,
}

/// Run the full pipeline against the hosted services.
pub async fn run_ingest(config: &Config, dry_run: bool) -> Result<()> {
    if dry_run {
        let outcome = load_documents(&config.data.base_path);
        let chunks = split_documents(&outcome.documents, &config.chunking);
        println!("ingest {} (dry-run)", config.index.name);
        println!("  documents loaded: {}", outcome.documents.len());
        println!("  files loaded: {}", outcome.files_loaded);
        println!("  files skipped: {}", outcome.files_skipped);
        println!("  folders missing: {}", outcome.folders_missing);
        println!("  chunks: {}", chunks.len());
        return Ok(());
    }

    let store = PineconeStore::connect(&config.index)
        .await
        .context("connecting to the vector store")?;
    let embedder = OpenAiEmbedder::new(&config.embedding).context("building embeddings client")?;

    let summary = run_ingest_with(config, &store, &embedder).await?;

    println!("ingest {}", config.index.name);
    println!("  documents loaded: {}", summary.documents);
    println!("  files loaded: {}", summary.files_loaded);
    println!("  files skipped: {}", summary.files_skipped);
    println!("  folders missing: {}", summary.folders_missing);
    println!("  chunks: {}", summary.chunks);
    println!(
        "  uploaded: {}/{}",
        summary.report.uploaded, summary.report.attempted
    );
    println!("  failed batches: {}", summary.report.failed_batches);
    println!("ok");
    Ok(())
}

/// Pipeline body with injectable store and embedder.
pub async fn run_ingest_with(
    config: &Config,
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
) -> Result<IngestSummary> {
    let outcome = load_documents(&config.data.base_path);
    if outcome.documents.is_empty() {
        println!("No documents found to embed.");
        return Ok(IngestSummary {
            files_loaded: outcome.files_loaded,
            files_skipped: outcome.files_skipped,
            folders_missing: outcome.folders_missing,
            ..Default::default()
        });
    }

    let chunks = split_documents(&outcome.documents, &config.chunking);
    println!(
        "Loaded {} documents ({} chunks); embedding with {} and uploading to '{}'...",
        outcome.documents.len(),
        chunks.len(),
        embedder.model_name(),
        store.index_name()
    );

    let report = upload_with_fallback(store, embedder, &chunks, &config.upload).await;

    Ok(IngestSummary {
        documents: outcome.documents.len(),
        files_loaded: outcome.files_loaded,
        files_skipped: outcome.files_skipped,
        folders_missing: outcome.folders_missing,
        chunks: chunks.len(),
        report,
    })
}
