//! Batch upload of chunks to the vector store.
//!
//! Chunks are embedded and upserted in fixed-size batches with a pacing
//! delay between successful batches. A failed batch larger than the
//! configured floor is split into two halves and each half retried once;
//! a failed half is dropped and the run continues. If a whole pass
//! uploads nothing, one more pass runs at the fallback batch size before
//! the run is declared a total failure and diagnostics are printed.
//!
//! This is a best-effort pipeline: partial success is a normal terminal
//! state, reported through counts.

use anyhow::{Context, Result};
use std::time::Duration;

use crate::config::UploadConfig;
use crate::embedding::Embedder;
use crate::models::Chunk;
use crate::store::{VectorMetadata, VectorRecord, VectorStore};

/// Counts from an upload run.
#[derive(Debug, Default, Clone, Copy)]
pub struct UploadReport {
    /// Chunks handed to outer batches; always the input length.
    pub attempted: usize,
    /// Chunks the store accepted.
    pub uploaded: usize,
    /// Batches (outer or half) that failed terminally.
    pub failed_batches: usize,
}

/// Upload all chunks, falling back to one smaller-batch pass when the
/// first pass uploads nothing.
pub async fn upload_with_fallback(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    config: &UploadConfig,
) -> UploadReport {
    if chunks.is_empty() {
        return UploadReport::default();
    }

    let report = upload_in_batches(store, embedder, chunks, config.batch_size, config).await;
    if report.uploaded > 0 {
        return report;
    }

    println!(
        "No chunks uploaded; retrying with batch size {}...",
        config.fallback_batch_size
    );
    let fallback =
        upload_in_batches(store, embedder, chunks, config.fallback_batch_size, config).await;
    if fallback.uploaded == 0 {
        print_failure_diagnostics(store, embedder, chunks).await;
    }
    fallback
}

/// One pass over the chunks at the given batch size.
pub async fn upload_in_batches(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    batch_size: usize,
    config: &UploadConfig,
) -> UploadReport {
    let mut report = UploadReport::default();
    let delay = Duration::from_millis(config.batch_delay_ms);
    let total = chunks.len();

    for (number, batch) in chunks.chunks(batch_size).enumerate() {
        report.attempted += batch.len();

        match embed_and_upsert(store, embedder, batch).await {
            Ok(count) => {
                report.uploaded += count;
                println!(
                    "Uploaded batch {}: {} chunks (total {}/{})",
                    number + 1,
                    count,
                    report.uploaded,
                    total
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                eprintln!("Warning: failed to upload batch {}: {:#}", number + 1, e);

                if batch.len() > config.min_batch_size {
                    // One level of splitting only: halves are retried
                    // once and never split further.
                    let half = batch.len().div_ceil(2);
                    for sub in batch.chunks(half) {
                        match embed_and_upsert(store, embedder, sub).await {
                            Ok(count) => {
                                report.uploaded += count;
                                println!(
                                    "Uploaded retry batch: {} chunks (total {}/{})",
                                    count, report.uploaded, total
                                );
                                tokio::time::sleep(delay).await;
                            }
                            Err(sub_err) => {
                                eprintln!("Warning: retry batch failed too: {:#}", sub_err);
                                report.failed_batches += 1;
                            }
                        }
                    }
                } else {
                    report.failed_batches += 1;
                }
            }
        }
    }

    report
}

/// Embed a batch and upsert the resulting vectors.
async fn embed_and_upsert(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    batch: &[Chunk],
) -> Result<usize> {
    let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
    let vectors = embedder
        .embed(&texts)
        .await
        .context("embedding batch failed")?;

    let records: Vec<VectorRecord> = batch
        .iter()
        .zip(vectors)
        .map(|(chunk, values)| VectorRecord {
            id: chunk.id.clone(),
            values,
            metadata: VectorMetadata::new(&chunk.content, &chunk.metadata),
        })
        .collect();

    let count = store
        .upsert(&records)
        .await
        .context("upserting batch failed")?;
    Ok(count)
}

/// Printed once when every upload attempt failed, to make the usual
/// causes (wrong index, dimension mismatch, missing key) visible without
/// a debugger.
async fn print_failure_diagnostics(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    chunks: &[Chunk],
) {
    println!("\nAll upload attempts failed. Diagnostics:");
    println!("  index name: {}", store.index_name());
    println!(
        "  embedding model: {} ({} dims)",
        embedder.model_name(),
        embedder.dims()
    );
    println!(
        "  PINECONE_API_KEY set: {}",
        std::env::var("PINECONE_API_KEY").is_ok()
    );

    match store.available_indexes().await {
        Ok(names) => println!("  available indexes: {:?}", names),
        Err(e) => println!("  could not list indexes: {}", e),
    }

    if let Some(sample) = chunks.first() {
        println!("  sample chunk length: {} characters", sample.content.len());
        println!(
            "  sample metadata: type={} source={} row_index={:?}",
            sample.metadata.doc_type, sample.metadata.source, sample.metadata.row_index
        );
    }
}
