//! Conversational memory
//!
//! - **History store**: durable, append-only record of every message of a session
//! - **Memory window**: the last `k` exchanges replayed into each prompt

mod history;
mod window;

pub use history::{ChatHistoryStore, InMemoryChatHistoryStore};
pub use window::{DEFAULT_WINDOW_SIZE, MemoryWindow};
