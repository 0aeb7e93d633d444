//! `pmc stats` command.

use anyhow::Result;

use crate::agent::RagAgent;
use crate::config::Config;
use crate::store::IndexStats;

/// Fetch and print index statistics.
pub async fn run_stats(config: &Config) -> Result<()> {
    let agent = RagAgent::from_config(config).await?;
    let stats = agent.get_index_stats().await?;
    print_stats(&stats);
    Ok(())
}

/// Stats block shared with the REPL's `stats` command.
pub fn print_stats(stats: &IndexStats) {
    println!("Index: {}", stats.index_name);
    println!("  vectors: {}", stats.total_vector_count);
    println!("  dimension: {}", stats.dimension);
    println!("  fullness: {:.4}", stats.index_fullness);
    println!("  namespaces: {}", stats.namespaces);
}
