//! # PM Copilot
//!
//! A retrieval-augmented assistant for product-management documents.
//!
//! PM Copilot ingests PRDs, sprint plans, and roadmaps from three local
//! folders, chunks and embeds them into a Pinecone index, and answers
//! questions grounded in the retrieved chunks via a CLI REPL and an HTTP
//! JSON API with per-session conversation memory.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────┐
//! │ prds/sprints │──▶│ chunk+embed  │──▶│ Pinecone  │
//! │ /roadmaps    │   │   pipeline   │   │   index   │
//! └──────────────┘   └──────────────┘   └────┬──────┘
//!                                            │ top-k
//!                       ┌────────────────────┤
//!                       ▼                    ▼
//!                  ┌─────────┐         ┌──────────┐
//!                  │   CLI   │         │   HTTP   │
//!                  │  (pmc)  │         │   API    │
//!                  └─────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pmc ingest                     # load, chunk, and upload the three folders
//! pmc chat                       # interactive REPL against the index
//! pmc search "onboarding KPIs"   # retrieval only, no generation
//! pmc serve                      # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`loader`] | Folder scanning and document extraction |
//! | [`chunk`] | Text chunking with overlap |
//! | [`uploader`] | Batch embed-and-upsert with fallback |
//! | [`store`] | Pinecone vector index client |
//! | [`embedding`] | Embeddings provider abstraction |
//! | [`chat`] | Chat completions provider abstraction |
//! | [`prompt`] | Prompt template and rendering |
//! | [`memory`] | Session-scoped conversation memory |
//! | [`agent`] | Retrieval-augmented ask/search/stats |
//! | [`ingest`] | Ingestion pipeline orchestration |
//! | [`server`] | HTTP JSON API |

pub mod agent;
pub mod chat;
pub mod chat_cmd;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod ingest;
pub mod loader;
pub mod memory;
pub mod models;
pub mod prompt;
pub mod search;
pub mod server;
pub mod stats;
pub mod store;
pub mod uploader;
