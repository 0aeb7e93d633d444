//! Core data models used throughout PM Copilot.
//!
//! These types represent the documents, chunks, and conversation turns that
//! flow through the ingestion and question-answering pipeline.

use serde::{Deserialize, Serialize};

/// Provenance attached to every document and chunk.
///
/// `doc_type` is the source folder name (prds, sprints, or roadmaps) and
/// `source` is the originating filename. CSV-derived documents also carry
/// the zero-based row they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMetadata {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
}

impl DocMetadata {
    pub fn new(doc_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            source: source.into(),
            row_index: None,
        }
    }

    pub fn with_row(doc_type: impl Into<String>, source: impl Into<String>, row: usize) -> Self {
        Self {
            doc_type: doc_type.into(),
            source: source.into(),
            row_index: Some(row),
        }
    }
}

/// A loaded source document, immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: DocMetadata,
}

/// A bounded-size, overlapping segment of a document's content.
///
/// Metadata is inherited from the parent document unchanged. The id is a
/// hex digest over source identity and content, so re-ingesting the same
/// data overwrites vectors in place instead of duplicating them.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub metadata: DocMetadata,
}

/// One entry of a conversation, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}
