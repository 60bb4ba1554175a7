//! Bounded view of the most recent exchanges of one session

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

use super::history::ChatHistoryStore;
use crate::errors::Result;
use crate::types::{Exchange, Message, Role};

/// Number of exchanges replayed into each prompt by default
pub const DEFAULT_WINDOW_SIZE: usize = 3;

/// Windowed conversational memory backed by a [`ChatHistoryStore`]
///
/// The store keeps the full history under the session key; the window only
/// holds the last `k` exchanges, which is what gets rendered into prompts.
pub struct MemoryWindow {
    store: Arc<dyn ChatHistoryStore>,
    session_key: String,
    k: usize,
    window: Mutex<VecDeque<Exchange>>,
}

impl MemoryWindow {
    /// Open the window for a session key, hydrating it from the store
    pub async fn open(
        store: Arc<dyn ChatHistoryStore>,
        session_key: impl Into<String>,
        k: usize,
    ) -> Result<Self> {
        let session_key = session_key.into();
        let stored = store.messages(&session_key).await?;
        let exchanges = pair_exchanges(&stored);

        let mut window = VecDeque::with_capacity(k + 1);
        let skip = exchanges.len().saturating_sub(k);
        window.extend(exchanges.into_iter().skip(skip));

        debug!(
            "Opened memory window for {} with {} exchanges",
            session_key,
            window.len()
        );

        Ok(Self {
            store,
            session_key,
            k,
            window: Mutex::new(window),
        })
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn capacity(&self) -> usize {
        self.k
    }

    /// Most recent `k` exchanges in chronological order
    pub fn load(&self) -> Vec<Exchange> {
        self.window.lock().iter().cloned().collect()
    }

    /// Persist one exchange and push it onto the window
    pub async fn save(&self, question: &str, answer: &str) -> Result<()> {
        self.store
            .append(&self.session_key, Message::human(question))
            .await?;
        self.store
            .append(&self.session_key, Message::assistant(answer))
            .await?;

        let mut window = self.window.lock();
        window.push_back(Exchange::new(question, answer));
        while window.len() > self.k {
            window.pop_front();
        }
        Ok(())
    }

    /// Forget everything stored for this session
    pub async fn clear(&self) -> Result<()> {
        self.store.clear(&self.session_key).await?;
        self.window.lock().clear();
        debug!("Cleared memory window for {}", self.session_key);
        Ok(())
    }
}

/// Pair each human message with the assistant message that follows it
fn pair_exchanges(messages: &[Message]) -> Vec<Exchange> {
    let mut exchanges = Vec::with_capacity(messages.len() / 2);
    let mut pending: Option<&str> = None;

    for message in messages {
        match message.role {
            Role::Human => pending = Some(message.content.as_str()),
            Role::Assistant => {
                if let Some(question) = pending.take() {
                    exchanges.push(Exchange::new(question, message.content.clone()));
                }
            },
        }
    }

    exchanges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryChatHistoryStore;

    async fn window(store: Arc<InMemoryChatHistoryStore>, k: usize) -> MemoryWindow {
        MemoryWindow::open(store, "alice_s1", k).await.unwrap()
    }

    #[tokio::test]
    async fn test_load_returns_min_n_k_most_recent() {
        for n in 0..7 {
            let store = Arc::new(InMemoryChatHistoryStore::new());
            let memory = window(store, DEFAULT_WINDOW_SIZE).await;

            for i in 0..n {
                memory
                    .save(&format!("q{i}"), &format!("a{i}"))
                    .await
                    .unwrap();
            }

            let loaded = memory.load();
            assert_eq!(loaded.len(), n.min(DEFAULT_WINDOW_SIZE));
            let expected: Vec<Exchange> = (n.saturating_sub(DEFAULT_WINDOW_SIZE)..n)
                .map(|i| Exchange::new(format!("q{i}"), format!("a{i}")))
                .collect();
            assert_eq!(loaded, expected);
        }
    }

    #[tokio::test]
    async fn test_clear_then_load_is_empty() {
        let store = Arc::new(InMemoryChatHistoryStore::new());
        let memory = window(store.clone(), 3).await;
        memory.save("q", "a").await.unwrap();
        memory.save("q2", "a2").await.unwrap();

        memory.clear().await.unwrap();
        assert!(memory.load().is_empty());
        assert!(store.messages("alice_s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_keeps_full_history() {
        let store = Arc::new(InMemoryChatHistoryStore::new());
        let memory = window(store.clone(), 2).await;
        for i in 0..5 {
            memory.save(&format!("q{i}"), "a").await.unwrap();
        }
        assert_eq!(store.messages("alice_s1").await.unwrap().len(), 10);
        assert_eq!(memory.load().len(), 2);
    }

    #[tokio::test]
    async fn test_open_hydrates_tail_from_store() {
        let store = Arc::new(InMemoryChatHistoryStore::new());
        {
            let memory = window(store.clone(), 3).await;
            for i in 0..4 {
                memory.save(&format!("q{i}"), &format!("a{i}")).await.unwrap();
            }
        }

        let reopened = window(store.clone(), 3).await;
        let loaded = reopened.load();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].question, "q1");
        assert_eq!(loaded[2].answer, "a3");

        let fresh = MemoryWindow::open(store, "alice_s2", 3).await.unwrap();
        assert!(fresh.load().is_empty());
    }

    #[test]
    fn test_pair_exchanges_skips_unpaired() {
        let messages = vec![
            Message::assistant("welcome"),
            Message::human("q1"),
            Message::assistant("a1"),
            Message::human("dangling"),
        ];
        let exchanges = pair_exchanges(&messages);
        assert_eq!(exchanges, vec![Exchange::new("q1", "a1")]);
    }
}
