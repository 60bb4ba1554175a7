//! Durable chat-history stores
//!
//! The history store keeps every message of a session under a session key.
//! It is only consumed through [`MemoryWindow`](super::MemoryWindow).

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::info;

use crate::errors::Result;
use crate::types::Message;

/// Trait for chat-history storage backends
///
/// Implementations must be thread-safe (Send + Sync) as they are shared
/// between sessions.
#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    /// All messages stored under the key, oldest first
    async fn messages(&self, session_key: &str) -> Result<Vec<Message>>;

    /// Append one message
    async fn append(&self, session_key: &str, message: Message) -> Result<()>;

    /// Remove every message stored under the key
    async fn clear(&self, session_key: &str) -> Result<()>;
}

/// In-memory implementation of ChatHistoryStore
///
/// Data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryChatHistoryStore {
    sessions: RwLock<HashMap<String, Vec<Message>>>,
}

impl InMemoryChatHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of session keys with at least one message
    pub fn session_count(&self) -> usize {
        self.sessions.read().values().filter(|m| !m.is_empty()).count()
    }
}

#[async_trait]
impl ChatHistoryStore for InMemoryChatHistoryStore {
    async fn messages(&self, session_key: &str) -> Result<Vec<Message>> {
        Ok(self
            .sessions
            .read()
            .get(session_key)
            .cloned()
            .unwrap_or_default())
    }

    async fn append(&self, session_key: &str, message: Message) -> Result<()> {
        self.sessions
            .write()
            .entry(session_key.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn clear(&self, session_key: &str) -> Result<()> {
        if let Some(removed) = self.sessions.write().remove(session_key) {
            info!(
                "Cleared {} history messages for {}",
                removed.len(),
                session_key
            );
        }
        Ok(())
    }
}
