//! Conversation context storage.

use advisor_core::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One prior exchange in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Append-only store of conversation turns per session.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Prior turns of `session_id`, oldest first. Unknown sessions are empty.
    async fn load_context(&self, session_id: &str) -> AppResult<Vec<Turn>>;

    async fn append_turn(&self, session_id: &str, turn: Turn) -> AppResult<()>;
}

/// Process-local session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Vec<Turn>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load_context(&self, session_id: &str) -> AppResult<Vec<Turn>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_turn(&self, session_id: &str, turn: Turn) -> AppResult<()> {
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(turn);
        Ok(())
    }
}
