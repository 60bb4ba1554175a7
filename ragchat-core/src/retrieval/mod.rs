//! Retrieval collaborators
//!
//! The vector store and the embedder are external services; this module only
//! defines the seams and the [`Retriever`] that queries through them.

mod hashing;
mod memory;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::errors::Result;
use crate::types::Document;

pub use hashing::HashingEmbedder;
pub use memory::InMemoryVectorStore;

/// Number of chunks retrieved per question by default
pub const DEFAULT_TOP_K: usize = 4;

/// Stateless text-to-vector function handed to vector stores
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of chunk texts, one vector per input, in input order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimension of produced vectors
    fn dimension(&self) -> usize;
}

/// Per-user document collection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Index a batch of chunks, returning how many were stored
    async fn add_documents(&self, documents: Vec<Document>) -> Result<usize>;

    /// Up to `k` chunks most similar to `query`, best first
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>>;

    /// Drop every chunk of the collection
    async fn clear(&self) -> Result<()>;
}

/// Query-time view over a vector store with a fixed `k`
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    k: usize,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, k: usize) -> Self {
        Self { store, k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Top-`k` chunks relevant to the question
    pub async fn get_relevant_documents(&self, question: &str) -> Result<Vec<Document>> {
        let documents = self.store.similarity_search(question, self.k).await?;
        debug!(
            "Retrieved {} documents (k={}) for question",
            documents.len(),
            self.k
        );
        Ok(documents)
    }
}

/// Cosine similarity of two vectors; 0.0 when either is all zeros
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_retriever_passes_k() {
        let mut store = MockVectorStore::new();
        store
            .expect_similarity_search()
            .times(1)
            .returning(|query, k| {
                assert_eq!(query, "refunds");
                assert_eq!(k, 4);
                Ok(vec![Document::new("Refunds take 14 days.", "policy.txt")])
            });

        let retriever = Retriever::new(Arc::new(store), DEFAULT_TOP_K);
        let docs = retriever.get_relevant_documents("refunds").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.source, "policy.txt");
    }
}
