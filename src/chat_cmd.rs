//! `pmc chat` command: interactive REPL.
//!
//! Reads questions from stdin and answers them against the index, keeping
//! an in-process conversation memory for the life of the session. Four
//! inputs are commands instead of questions: `history`, `clear`, `stats`,
//! and `quit` (or `exit`).

use std::io::{self, Write};

use anyhow::Result;

use crate::agent::{apology, truncate_content, RagAgent};
use crate::config::Config;
use crate::memory::ConversationMemory;
use crate::models::Role;
use crate::stats::print_stats;

/// Source previews in the REPL are shorter than the API's.
const REPL_PREVIEW_CHARS: usize = 150;

/// Run the interactive loop until `quit`, `exit`, or EOF.
pub async fn run_chat(config: &Config) -> Result<()> {
    let agent = RagAgent::from_config(config).await?;
    let mut memory = ConversationMemory::new();

    println!("PM Copilot — ask about your PRDs, sprint plans, and roadmaps.");
    println!("Index: {} | Model: {}", agent.index_name(), agent.chat_model_name());
    println!("Commands: history, clear, stats, quit\n");

    let stdin = io::stdin();
    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "quit" | "exit" => {
                println!("Goodbye!");
                break;
            }
            "history" => {
                print_history(&memory);
                continue;
            }
            "clear" => {
                memory.clear();
                println!("Conversation history cleared.");
                continue;
            }
            "stats" => {
                match agent.get_index_stats().await {
                    Ok(stats) => print_stats(&stats),
                    Err(e) => eprintln!("Could not fetch index stats: {}", e),
                }
                continue;
            }
            _ => {}
        }

        match agent.ask(&mut memory, input).await {
            Ok(reply) => {
                println!("\nAssistant: {}\n", reply.answer);
                if !reply.matches.is_empty() {
                    println!("Sources:");
                    for (i, m) in reply.matches.iter().enumerate() {
                        println!(
                            "  {}. [{}] {} — {}",
                            i + 1,
                            m.metadata.doc_type,
                            m.metadata.source,
                            truncate_content(&m.content, REPL_PREVIEW_CHARS)
                        );
                    }
                    println!();
                }
            }
            Err(e) => {
                println!("\nAssistant: {}\n", apology(&e));
            }
        }
    }

    Ok(())
}

fn print_history(memory: &ConversationMemory) {
    if memory.is_empty() {
        println!("No conversation history yet.");
        return;
    }
    for turn in memory.history() {
        let speaker = match turn.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
        };
        println!("{}: {}", speaker, turn.content);
    }
}
