//! `pmc search` command: one-shot similarity search.

use anyhow::Result;

use crate::agent::{truncate_content, RagAgent, SOURCE_PREVIEW_CHARS};
use crate::config::Config;

/// Embed the query, fetch the top `k` matches, and print them ranked.
pub async fn run_search(config: &Config, query: &str, k: usize) -> Result<()> {
    let agent = RagAgent::from_config(config).await?;
    let matches = agent.search_documents(query, k).await?;

    if matches.is_empty() {
        println!("No matches for '{}'.", query);
        return Ok(());
    }

    println!("Top {} matches for '{}':", matches.len(), query);
    for (i, m) in matches.iter().enumerate() {
        println!(
            "{}. {} ({}) — score {:.4}",
            i + 1,
            m.metadata.source,
            m.metadata.doc_type,
            m.score
        );
        println!("   {}", truncate_content(&m.content, SOURCE_PREVIEW_CHARS));
    }

    Ok(())
}
