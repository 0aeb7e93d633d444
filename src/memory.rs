//! Session-scoped conversation memory.
//!
//! [`ConversationMemory`] is a linear, append-only record of user and
//! assistant turns, owned by whoever drives the agent: the HTTP layer
//! keeps one per session in a [`SessionStore`], the chat REPL keeps one
//! for its process lifetime. The agent itself never holds history, so
//! concurrent sessions cannot read or interleave each other's context.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::models::{ConversationTurn, Role};

/// Session id used when a client does not name one.
pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Default, Clone)]
pub struct ConversationMemory {
    turns: Vec<ConversationTurn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one completed exchange, user turn first.
    pub fn record(&mut self, question: &str, answer: &str) {
        self.turns.push(ConversationTurn {
            role: Role::User,
            content: question.to_string(),
        });
        self.turns.push(ConversationTurn {
            role: Role::Assistant,
            content: answer.to_string(),
        });
    }

    /// Turns in insertion order.
    pub fn history(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Drop all turns. Idempotent.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Registry of per-session memories, keyed by client-supplied id.
///
/// Each session's memory sits behind its own async mutex, so a chat call
/// can hold the session while it awaits the remote services; concurrent
/// chats on the same session serialize instead of interleaving history.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<tokio::sync::Mutex<ConversationMemory>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the session's memory, created on first use.
    pub fn session(&self, id: &str) -> Arc<tokio::sync::Mutex<ConversationMemory>> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.entry(id.to_string()).or_default().clone()
    }
}
