//! Integration tests for the HTTP facade.
//!
//! These spin up the real Axum server with an agent wired to in-memory
//! trait doubles, then exercise the wire contract with a plain HTTP
//! client: response shapes, session isolation, soft error handling, and
//! the degraded no-agent mode.

use async_trait::async_trait;
use pm_copilot::agent::RagAgent;
use pm_copilot::chat::{ChatError, ChatMessage, ChatModel};
use pm_copilot::config::Config;
use pm_copilot::embedding::{EmbedError, Embedder};
use pm_copilot::models::DocMetadata;
use pm_copilot::prompt::PromptTemplate;
use pm_copilot::server::run_server_with_agent;
use pm_copilot::store::{IndexStats, ScoredMatch, StoreError, VectorRecord, VectorStore};
use serde_json::{json, Value};
use std::sync::Arc;

// ─── Trait doubles ──────────────────────────────────────────────────

/// Embedder returning a fixed vector for every input.
struct CannedEmbedder;

#[async_trait]
impl Embedder for CannedEmbedder {
    fn model_name(&self) -> &str {
        "canned-embedder"
    }

    fn dims(&self) -> usize {
        8
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|_| vec![0.25; 8]).collect())
    }
}

/// Vector store serving canned matches, or failing on demand.
struct CannedStore {
    matches: Vec<ScoredMatch>,
    fail: bool,
}

#[async_trait]
impl VectorStore for CannedStore {
    fn index_name(&self) -> &str {
        "pm-copilot-test"
    }

    async fn upsert(&self, vectors: &[VectorRecord]) -> Result<usize, StoreError> {
        Ok(vectors.len())
    }

    async fn query(&self, _vector: &[f32], top_k: usize) -> Result<Vec<ScoredMatch>, StoreError> {
        if self.fail {
            return Err(StoreError::Api {
                status: 503,
                message: "index offline".into(),
            });
        }
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }

    async fn stats(&self) -> Result<IndexStats, StoreError> {
        if self.fail {
            return Err(StoreError::Api {
                status: 503,
                message: "index offline".into(),
            });
        }
        Ok(IndexStats {
            index_name: "pm-copilot-test".to_string(),
            total_vector_count: self.matches.len() as u64,
            dimension: 8,
            namespaces: json!({ "": { "vectorCount": self.matches.len() } }),
            index_fullness: 0.0,
        })
    }

    async fn available_indexes(&self) -> Result<Vec<String>, StoreError> {
        Ok(vec!["pm-copilot-test".to_string()])
    }
}

/// Chat model answering a canned reply, or failing on demand.
struct CannedChat {
    reply: String,
    fail: bool,
}

#[async_trait]
impl ChatModel for CannedChat {
    fn model_name(&self) -> &str {
        "canned-chat"
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, ChatError> {
        if self.fail {
            return Err(ChatError::Api {
                status: 500,
                message: "model offline".into(),
            });
        }
        Ok(self.reply.clone())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Two matches: one with over-limit content to observe truncation, one
/// short and CSV-free.
fn sample_matches() -> Vec<ScoredMatch> {
    vec![
        ScoredMatch {
            id: "m1".to_string(),
            score: 0.92,
            content: "x".repeat(260),
            metadata: DocMetadata::with_row("sprints", "plan.csv", 1),
        },
        ScoredMatch {
            id: "m2".to_string(),
            score: 0.81,
            content: "Q3 theme is activation.".to_string(),
            metadata: DocMetadata::new("roadmaps", "q3.md"),
        },
    ]
}

fn build_agent(store: CannedStore, chat: CannedChat) -> Arc<RagAgent> {
    Arc::new(RagAgent::new(
        Arc::new(store),
        Arc::new(CannedEmbedder),
        Arc::new(chat),
        PromptTemplate::default(),
        5,
    ))
}

fn ready_agent(reply: &str) -> Arc<RagAgent> {
    build_agent(
        CannedStore {
            matches: sample_matches(),
            fail: false,
        },
        CannedChat {
            reply: reply.to_string(),
            fail: false,
        },
    )
}

fn test_config_with_port(port: u16) -> Config {
    toml::from_str(&format!("[server]\nbind = \"127.0.0.1:{}\"\n", port)).unwrap()
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn spawn_server(port: u16, agent: Option<Arc<RagAgent>>) -> tokio::task::JoinHandle<()> {
    let cfg = test_config_with_port(port);
    tokio::spawn(async move {
        run_server_with_agent(&cfg, agent).await.ok();
    })
}

/// Poll the liveness endpoint; it answers 200 even in degraded mode.
async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_root_health_and_cors_when_ready() {
    let port = find_free_port();
    let server_handle = spawn_server(port, Some(ready_agent("ok")));
    wait_for_server(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", port);

    let resp = client.get(format!("{}/", base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "PM Copilot API is running");
    assert_eq!(body["status"], "healthy");

    let resp = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["agent_initialized"], true);

    // Whitelisted origins are echoed back with credentials allowed.
    let resp = client
        .get(format!("{}/health", base))
        .header("Origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );
    assert_eq!(
        resp.headers()
            .get("access-control-allow-credentials")
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );

    // Unlisted origins get no CORS grant.
    let resp = client
        .get(format!("{}/health", base))
        .header("Origin", "http://evil.example")
        .send()
        .await
        .unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());

    server_handle.abort();
}

#[tokio::test]
async fn test_degraded_mode_without_agent() {
    let port = find_free_port();
    let server_handle = spawn_server(port, None);
    wait_for_server(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", port);

    // Liveness still answers.
    let resp = client.get(format!("{}/", base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    // Readiness reports the missing agent.
    let resp = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["agent_initialized"], false);

    // Delegating endpoints refuse with a coded error.
    for (method, path, payload) in [
        ("POST", "/chat", Some(json!({ "message": "hi" }))),
        ("POST", "/search", Some(json!({ "query": "roadmap" }))),
        ("GET", "/stats", None),
    ] {
        let req = match method {
            "POST" => client.post(format!("{}{}", base, path)).json(&payload),
            _ => client.get(format!("{}{}", base, path)),
        };
        let resp = req.send().await.unwrap();
        assert_eq!(resp.status(), 503, "{} {} should 503", method, path);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "agent_unavailable");
    }

    // Sessions live in the facade, so history works without the agent.
    let resp = client
        .get(format!("{}/history", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["history"].as_array().unwrap().len(), 0);

    let resp = client
        .delete(format!("{}/history", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Conversation history cleared successfully");

    server_handle.abort();
}

#[tokio::test]
async fn test_chat_records_history_and_truncates_sources() {
    let port = find_free_port();
    let server_handle = spawn_server(port, Some(ready_agent("Ship the onboarding flow.")));
    wait_for_server(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", port);

    let resp = client
        .post(format!("{}/chat", base))
        .json(&json!({ "message": "What is the sprint goal?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();

    assert_eq!(body["answer"], "Ship the onboarding flow.");
    assert_eq!(body["question"], "What is the sprint goal?");
    assert!(body["timestamp"].as_f64().unwrap() > 0.0);
    assert!(body.get("error").is_none(), "success must not set error");

    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 2);
    let first = sources[0]["content"].as_str().unwrap();
    assert_eq!(first.len(), 203, "260 chars must truncate to 200 + ellipsis");
    assert!(first.ends_with("..."));
    assert_eq!(sources[0]["type"], "sprints");
    assert_eq!(sources[0]["source"], "plan.csv");
    assert_eq!(sources[0]["metadata"]["row_index"], 1);
    assert_eq!(
        sources[1]["content"], "Q3 theme is activation.",
        "short content passes through untouched"
    );

    // The exchange landed in the default session's history.
    let resp = client
        .get(format!("{}/history", base))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["role"], "user");
    assert_eq!(history[0]["content"], "What is the sprint goal?");
    assert_eq!(history[1]["role"], "assistant");
    assert_eq!(history[1]["content"], "Ship the onboarding flow.");

    // include_sources=false omits the field entirely.
    let resp = client
        .post(format!("{}/chat", base))
        .json(&json!({ "message": "And the Q3 theme?", "include_sources": false }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert!(body.get("sources").is_none());

    server_handle.abort();
}

#[tokio::test]
async fn test_chat_sessions_are_isolated() {
    let port = find_free_port();
    let server_handle = spawn_server(port, Some(ready_agent("An answer.")));
    wait_for_server(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", port);

    for session in ["alice", "bob"] {
        let resp = client
            .post(format!("{}/chat", base))
            .json(&json!({ "message": "hello", "session": session }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let history_len = |body: &Value| body["history"].as_array().unwrap().len();

    let body: Value = client
        .get(format!("{}/history?session=alice", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history_len(&body), 2);

    let body: Value = client
        .get(format!("{}/history?session=bob", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history_len(&body), 2);

    // The default session saw none of it.
    let body: Value = client
        .get(format!("{}/history", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history_len(&body), 0);

    // Clearing one session leaves the other intact.
    let resp = client
        .delete(format!("{}/history?session=alice", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = client
        .get(format!("{}/history?session=alice", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history_len(&body), 0);

    let body: Value = client
        .get(format!("{}/history?session=bob", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history_len(&body), 2);

    server_handle.abort();
}

#[tokio::test]
async fn test_chat_upstream_failure_is_soft() {
    let port = find_free_port();
    let agent = build_agent(
        CannedStore {
            matches: sample_matches(),
            fail: false,
        },
        CannedChat {
            reply: String::new(),
            fail: true,
        },
    );
    let server_handle = spawn_server(port, Some(agent));
    wait_for_server(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", port);

    let resp = client
        .post(format!("{}/chat", base))
        .json(&json!({ "message": "will this break?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "upstream failure must not become 5xx");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], true);
    assert!(body["answer"]
        .as_str()
        .unwrap()
        .starts_with("I'm sorry, I encountered an error while processing your question:"));
    assert_eq!(body["sources"].as_array().unwrap().len(), 0);

    // Failed exchanges never reach the session history.
    let body: Value = client
        .get(format!("{}/history", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["history"].as_array().unwrap().len(), 0);

    // Blank input is a client error, not a soft failure.
    let resp = client
        .post(format!("{}/chat", base))
        .json(&json!({ "message": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    server_handle.abort();
}

#[tokio::test]
async fn test_search_returns_documents_and_echoes_query() {
    let port = find_free_port();
    let server_handle = spawn_server(port, Some(ready_agent("unused")));
    wait_for_server(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", port);

    let resp = client
        .post(format!("{}/search", base))
        .json(&json!({ "query": "onboarding" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["query"], "onboarding");
    let documents = body["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0]["type"], "sprints");
    assert_eq!(documents[0]["source"], "plan.csv");
    assert!(documents[0]["content"].as_str().unwrap().ends_with("..."));

    // k narrows the result set.
    let resp = client
        .post(format!("{}/search", base))
        .json(&json!({ "query": "onboarding", "k": 1 }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["documents"].as_array().unwrap().len(), 1);

    // Blank query is rejected.
    let resp = client
        .post(format!("{}/search", base))
        .json(&json!({ "query": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    server_handle.abort();
}

#[tokio::test]
async fn test_search_failure_yields_empty_list() {
    let port = find_free_port();
    let agent = build_agent(
        CannedStore {
            matches: Vec::new(),
            fail: true,
        },
        CannedChat {
            reply: String::new(),
            fail: false,
        },
    );
    let server_handle = spawn_server(port, Some(agent));
    wait_for_server(port).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://127.0.0.1:{}/search", port))
        .json(&json!({ "query": "anything" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["documents"].as_array().unwrap().len(), 0);
    assert_eq!(body["query"], "anything");

    server_handle.abort();
}

#[tokio::test]
async fn test_stats_shape_and_store_failure() {
    let port = find_free_port();
    let server_handle = spawn_server(port, Some(ready_agent("unused")));
    wait_for_server(port).await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://127.0.0.1:{}/stats", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["index_name"], "pm-copilot-test");
    assert_eq!(body["total_vector_count"], 2);
    assert_eq!(body["dimension"], 8);
    assert!(body["namespaces"].is_object());
    assert!(body["index_fullness"].is_number());
    server_handle.abort();

    // A failing store surfaces as 500 with the upstream message.
    let port = find_free_port();
    let agent = build_agent(
        CannedStore {
            matches: Vec::new(),
            fail: true,
        },
        CannedChat {
            reply: String::new(),
            fail: false,
        },
    );
    let server_handle = spawn_server(port, Some(agent));
    wait_for_server(port).await;

    let resp = client
        .get(format!("http://127.0.0.1:{}/stats", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "internal");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("index offline"));

    server_handle.abort();
}
