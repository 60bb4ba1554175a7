//! In-memory vector store
//!
//! Brute-force cosine ranking over every stored chunk. Suitable for
//! development and tests; data is lost when the process exits.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use super::{Embedder, VectorStore, cosine_similarity};
use crate::errors::Result;
use crate::types::Document;

pub struct InMemoryVectorStore {
    collection: String,
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<(Document, Vec<f32>)>>,
}

impl InMemoryVectorStore {
    pub fn new(collection: impl Into<String>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            collection: collection.into(),
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add_documents(&self, documents: Vec<Document>) -> Result<usize> {
        let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;

        let count = documents.len();
        self.entries
            .write()
            .extend(documents.into_iter().zip(vectors));
        info!("Indexed {} chunks into {}", count, self.collection);
        Ok(count)
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        let query_vector = self.embedder.embed_query(query).await?;

        let entries = self.entries.read();
        let mut scored: Vec<(f32, usize)> = entries
            .iter()
            .enumerate()
            .map(|(idx, (_, vector))| (cosine_similarity(&query_vector, vector), idx))
            .collect();

        // Stable on ties: earlier inserts first
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, idx)| entries[idx].0.clone())
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write();
        info!(
            "Clearing {} chunks from {}",
            entries.len(),
            self.collection
        );
        entries.clear();
        Ok(())
    }
}
