//! Hosted storage backends (Astra DB Data API)

mod astra;

pub use astra::{
    AstraChatHistoryStore, AstraClient, AstraCollection, AstraConfig, AstraVectorStore,
    INSERT_BATCH_SIZE,
};

/// Name of the per-user vector collection
pub fn vector_collection_name(username: &str) -> String {
    format!("vector_context_{username}")
}
