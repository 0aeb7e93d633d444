//! Retrieval-augmented agent.
//!
//! Wires the embedder, the vector store, and the chat model behind one
//! `ask` operation: embed the question, fetch the top-k similar chunks,
//! render the prompt with context and session history, generate, then
//! append the exchange to the caller's memory. Failures come back as a
//! tagged [`AgentError`] so callers can tell which upstream broke; the
//! HTTP facade and the REPL translate that into the soft apology shape
//! clients see.

use std::sync::Arc;

use thiserror::Error;

use crate::chat::{ChatError, ChatMessage, ChatModel, OpenAiChat};
use crate::config::Config;
use crate::embedding::{EmbedError, Embedder, OpenAiEmbedder};
use crate::memory::ConversationMemory;
use crate::models::DocMetadata;
use crate::prompt::{format_context, format_history, PromptTemplate};
use crate::store::{IndexStats, PineconeStore, ScoredMatch, StoreError, VectorStore};

/// Maximum characters of source content echoed back with an answer.
pub const SOURCE_PREVIEW_CHARS: usize = 200;

/// Upstream failure, tagged by which service broke.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("embedding service failure: {0}")]
    Embedding(#[from] EmbedError),
    #[error("vector store failure: {0}")]
    Store(#[from] StoreError),
    #[error("generation failure: {0}")]
    Generation(#[from] ChatError),
}

/// Successful `ask` outcome: the answer plus the matches that fed it.
#[derive(Debug)]
pub struct AskReply {
    pub answer: String,
    pub matches: Vec<ScoredMatch>,
}

/// One retrieved source as shown to clients, content capped for display.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceRef {
    pub content: String,
    pub metadata: DocMetadata,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub source: String,
}

pub struct RagAgent {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    prompt: PromptTemplate,
    top_k: usize,
}

impl RagAgent {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        prompt: PromptTemplate,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            chat,
            prompt,
            top_k,
        }
    }

    /// Build an agent with the concrete hosted-service clients.
    ///
    /// Fails when credentials are missing or the index cannot be
    /// resolved; the server treats that as permanently uninitialized.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = PineconeStore::connect(&config.index).await?;
        let embedder = OpenAiEmbedder::new(&config.embedding)?;
        let chat = OpenAiChat::new(&config.chat)?;

        Ok(Self::new(
            Arc::new(store),
            Arc::new(embedder),
            Arc::new(chat),
            PromptTemplate::default(),
            config.retrieval.top_k,
        ))
    }

    /// Answer a question with retrieval and session history.
    ///
    /// Memory is updated only when the whole exchange succeeds, so a
    /// failed call leaves the session exactly as it was.
    pub async fn ask(
        &self,
        memory: &mut ConversationMemory,
        question: &str,
    ) -> Result<AskReply, AgentError> {
        let vector = self.embedder.embed_query(question).await?;
        let matches = self.store.query(&vector, self.top_k).await?;

        let context = format_context(&matches);
        let history = format_history(memory.history());
        let rendered = self.prompt.render(&context, &history, question);

        let answer = self.chat.complete(&[ChatMessage::user(rendered)]).await?;
        memory.record(question, &answer);

        Ok(AskReply { answer, matches })
    }

    /// Similarity search only: no generation, no memory mutation.
    pub async fn search_documents(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredMatch>, AgentError> {
        let vector = self.embedder.embed_query(query).await?;
        let matches = self.store.query(&vector, k).await?;
        Ok(matches)
    }

    /// Read-through index statistics.
    pub async fn get_index_stats(&self) -> Result<IndexStats, AgentError> {
        Ok(self.store.stats().await?)
    }

    pub fn index_name(&self) -> &str {
        self.store.index_name()
    }

    pub fn chat_model_name(&self) -> &str {
        self.chat.model_name()
    }
}

/// The soft error answer clients receive instead of a raised failure.
pub fn apology(error: &AgentError) -> String {
    format!(
        "I'm sorry, I encountered an error while processing your question: {}",
        error
    )
}

/// Shape matches for client display, truncating long content.
pub fn to_source_refs(matches: &[ScoredMatch]) -> Vec<SourceRef> {
    matches
        .iter()
        .map(|m| SourceRef {
            content: truncate_content(&m.content, SOURCE_PREVIEW_CHARS),
            metadata: m.metadata.clone(),
            doc_type: m.metadata.doc_type.clone(),
            source: m.metadata.source.clone(),
        })
        .collect()
}

/// First `limit` characters plus an ellipsis marker; shorter content is
/// returned unchanged.
pub fn truncate_content(content: &str, limit: usize) -> String {
    if content.chars().count() > limit {
        let mut truncated: String = content.chars().take(limit).collect();
        truncated.push_str("...");
        truncated
    } else {
        content.to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_ask_retrieves_generates_and_records() {
        let agent = stub_agent(
            StubStore::with_matches(vec![scored("Sprint goals", "sprints", "plan.csv")]),
            StubEmbedder { fail: false },
            StubChat::answering("Ship the onboarding flow."),
        );
        let mut memory = ConversationMemory::new();

        let reply = agent.ask(&mut memory, "What should we ship?").await.unwrap();
        assert_eq!(reply.answer, "Ship the onboarding flow.");
        assert_eq!(reply.matches.len(), 1);

        let turns = memory.history();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "What should we ship?");
        assert_eq!(turns[1].content, "Ship the onboarding flow.");
    }

    #[tokio::test]
    async fn test_ask_store_failure_is_tagged_and_leaves_memory_untouched() {
        let agent = stub_agent(
            StubStore::failing(),
            StubEmbedder { fail: false },
            StubChat::answering("unused"),
        );
        let mut memory = ConversationMemory::new();

        let err = agent.ask(&mut memory, "anything").await.unwrap_err();
        assert!(matches!(err, AgentError::Store(_)));
        assert!(memory.is_empty());

        let answer = apology(&err);
        assert!(answer.starts_with("I'm sorry, I encountered an error"));
        assert!(!answer.is_empty());
    }

    #[tokio::test]
    async fn test_ask_embedding_failure_is_tagged() {
        let agent = stub_agent(
            StubStore::with_matches(vec![]),
            StubEmbedder { fail: true },
            StubChat::answering("unused"),
        );
        let mut memory = ConversationMemory::new();

        let err = agent.ask(&mut memory, "anything").await.unwrap_err();
        assert!(matches!(err, AgentError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_ask_generation_failure_is_tagged() {
        let agent = stub_agent(
            StubStore::with_matches(vec![scored("ctx", "prds", "a.md")]),
            StubEmbedder { fail: false },
            StubChat {
                answer: String::new(),
                fail: true,
            },
        );
        let mut memory = ConversationMemory::new();

        let err = agent.ask(&mut memory, "anything").await.unwrap_err();
        assert!(matches!(err, AgentError::Generation(_)));
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_search_documents_does_not_touch_memory_or_generate() {
        let agent = stub_agent(
            StubStore::with_matches(vec![
                scored("first", "prds", "a.md"),
                scored("second", "roadmaps", "q3.md"),
            ]),
            StubEmbedder { fail: false },
            StubChat { answer: String::new(), fail: true },
        );

        let matches = agent.search_documents("roadmap", 1).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].content, "first");
    }

    #[tokio::test]
    async fn test_stats_passthrough() {
        let agent = stub_agent(
            StubStore::with_matches(vec![scored("x", "prds", "a.md")]),
            StubEmbedder { fail: false },
            StubChat::answering("ok"),
        );
        let stats = agent.get_index_stats().await.unwrap();
        assert_eq!(stats.index_name, "stub-index");
        assert_eq!(stats.total_vector_count, 1);
    }

    #[test]
    fn test_truncation_rule() {
        let long = "a".repeat(250);
        let truncated = truncate_content(&long, SOURCE_PREVIEW_CHARS);
        assert_eq!(truncated.len(), 203);
        assert!(truncated.ends_with("..."));
        assert_eq!(&truncated[..200], &long[..200]);

        let short = "b".repeat(150);
        assert_eq!(truncate_content(&short, SOURCE_PREVIEW_CHARS), short);

        let exact = "c".repeat(200);
        assert_eq!(truncate_content(&exact, SOURCE_PREVIEW_CHARS), exact);
    }

    #[test]
    fn test_source_refs_duplicate_type_and_source_fields() {
        let matches = vec![scored(&"d".repeat(300), "sprints", "plan.csv")];
        let refs = to_source_refs(&matches);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].doc_type, "sprints");
        assert_eq!(refs[0].source, "plan.csv");
        assert_eq!(refs[0].metadata.doc_type, "sprints");
        assert!(refs[0].content.ends_with("..."));
        assert_eq!(refs[0].content.chars().count(), 203);
    }
}
