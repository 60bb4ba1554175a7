//! Memoized collaborator handles
//!
//! [`Resources`] pairs the process-wide [`ResourceCache`] with a
//! [`ResourceFactory`] that knows how to build each collaborator. Handles
//! keyed by user or session key are rebuilt after [`Resources::clear_all`].

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::cache::{CacheStats, ResourceCache, ResourceKey};
use crate::errors::{RagError, Result};
use crate::memory::{ChatHistoryStore, DEFAULT_WINDOW_SIZE, InMemoryChatHistoryStore, MemoryWindow};
use crate::model::{ChatModel, OpenAiChatModel, OpenAiConfig, OpenAiEmbedder};
use crate::retrieval::{DEFAULT_TOP_K, Embedder, HashingEmbedder, InMemoryVectorStore, Retriever, VectorStore};
use crate::storage::{AstraChatHistoryStore, AstraConfig, AstraVectorStore, vector_collection_name};

/// Builds collaborators on cache misses
#[async_trait]
pub trait ResourceFactory: Send + Sync {
    async fn embedder(&self) -> Result<Arc<dyn Embedder>>;

    async fn vector_store(&self, user: &str, embedder: Arc<dyn Embedder>) -> Result<Arc<dyn VectorStore>>;

    async fn chat_model(&self) -> Result<Arc<dyn ChatModel>>;

    async fn history_store(&self) -> Result<Arc<dyn ChatHistoryStore>>;
}

/// Retrieval and memory sizes
#[derive(Debug, Clone, Copy)]
pub struct ResourceSettings {
    pub top_k_vectorstore: usize,
    pub top_k_memory: usize,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            top_k_vectorstore: DEFAULT_TOP_K,
            top_k_memory: DEFAULT_WINDOW_SIZE,
        }
    }
}

#[derive(Clone)]
pub struct Resources {
    cache: ResourceCache,
    factory: Arc<dyn ResourceFactory>,
    settings: ResourceSettings,
}

impl Resources {
    pub fn new(factory: Arc<dyn ResourceFactory>, settings: ResourceSettings) -> Self {
        Self {
            cache: ResourceCache::new(),
            factory,
            settings,
        }
    }

    pub fn settings(&self) -> ResourceSettings {
        self.settings
    }

    pub async fn embedding(&self) -> Result<Arc<dyn Embedder>> {
        self.cache
            .get_or_try_init(ResourceKey::singleton("embedding"), || self.factory.embedder())
            .await
    }

    pub async fn vector_store(&self, user: &str) -> Result<Arc<dyn VectorStore>> {
        let embedder = self.embedding().await?;
        self.cache
            .get_or_try_init(ResourceKey::scoped("vector_store", user), || {
                self.factory.vector_store(user, embedder)
            })
            .await
    }

    pub async fn retriever(&self, user: &str) -> Result<Retriever> {
        let store = self.vector_store(user).await?;
        let k = self.settings.top_k_vectorstore;
        self.cache
            .get_or_try_init(ResourceKey::scoped("retriever", user), || async move {
                Ok(Retriever::new(store, k))
            })
            .await
    }

    pub async fn model(&self) -> Result<Arc<dyn ChatModel>> {
        self.cache
            .get_or_try_init(ResourceKey::singleton("model"), || self.factory.chat_model())
            .await
    }

    pub async fn chat_history(&self) -> Result<Arc<dyn ChatHistoryStore>> {
        self.cache
            .get_or_try_init(ResourceKey::singleton("chat_history"), || {
                self.factory.history_store()
            })
            .await
    }

    /// Memory window of one session, keyed by `{user}_{session_id}`
    pub async fn memory(&self, session_key: &str) -> Result<Arc<MemoryWindow>> {
        let store = self.chat_history().await?;
        let k = self.settings.top_k_memory;
        self.cache
            .get_or_try_init(ResourceKey::scoped("memory", session_key), || async move {
                Ok(Arc::new(MemoryWindow::open(store, session_key, k).await?))
            })
            .await
    }

    /// Drop the cached memory window of a session that ended
    ///
    /// The history store keeps its messages.
    pub fn forget_memory(&self, session_key: &str) -> bool {
        self.cache.remove(&ResourceKey::scoped("memory", session_key))
    }

    pub fn clear_all(&self) {
        self.cache.clear_all();
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }
}

/// Per-user Astra DB credentials
#[derive(Debug, Clone)]
pub struct UserStorage {
    pub api_endpoint: String,
    pub token: String,
}

/// OpenAI models with Astra DB vector and history collections
pub struct HostedResourceFactory {
    openai: OpenAiConfig,
    keyspace: String,
    history: AstraConfig,
    history_collection: String,
    users: HashMap<String, UserStorage>,
}

impl HostedResourceFactory {
    pub fn new(
        openai: OpenAiConfig,
        history: AstraConfig,
        history_collection: impl Into<String>,
        users: HashMap<String, UserStorage>,
    ) -> Self {
        Self {
            openai,
            keyspace: history.keyspace.clone(),
            history,
            history_collection: history_collection.into(),
            users,
        }
    }
}

#[async_trait]
impl ResourceFactory for HostedResourceFactory {
    async fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        Ok(Arc::new(OpenAiEmbedder::new(&self.openai)?))
    }

    async fn vector_store(&self, user: &str, embedder: Arc<dyn Embedder>) -> Result<Arc<dyn VectorStore>> {
        let storage = self
            .users
            .get(user)
            .ok_or_else(|| RagError::ConfigError(format!("no Astra DB credentials for {user}")))?;
        let config = AstraConfig {
            api_endpoint: storage.api_endpoint.clone(),
            token: storage.token.clone(),
            keyspace: self.keyspace.clone(),
        };
        let store = AstraVectorStore::connect(&config, &vector_collection_name(user), embedder).await?;
        Ok(Arc::new(store))
    }

    async fn chat_model(&self) -> Result<Arc<dyn ChatModel>> {
        let model = OpenAiChatModel::new(&self.openai)?;
        info!("Using chat model {}", model.model_name());
        Ok(Arc::new(model))
    }

    async fn history_store(&self) -> Result<Arc<dyn ChatHistoryStore>> {
        let store = AstraChatHistoryStore::connect(&self.history, &self.history_collection).await?;
        Ok(Arc::new(store))
    }
}

/// Process-local collaborators for development and tests
pub struct InMemoryResourceFactory {
    model: Arc<dyn ChatModel>,
    dimension: usize,
    history: Arc<InMemoryChatHistoryStore>,
    // Survive cache clears, like a hosted collection would.
    stores: RwLock<HashMap<String, Arc<InMemoryVectorStore>>>,
}

impl InMemoryResourceFactory {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            dimension: HashingEmbedder::default().dimension(),
            history: Arc::new(InMemoryChatHistoryStore::new()),
            stores: RwLock::new(HashMap::new()),
        }
    }

    pub fn history(&self) -> Arc<InMemoryChatHistoryStore> {
        Arc::clone(&self.history)
    }
}

#[async_trait]
impl ResourceFactory for InMemoryResourceFactory {
    async fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        Ok(Arc::new(HashingEmbedder::new(self.dimension)))
    }

    async fn vector_store(&self, user: &str, embedder: Arc<dyn Embedder>) -> Result<Arc<dyn VectorStore>> {
        let store: Arc<dyn VectorStore> = self
            .stores
            .write()
            .entry(user.to_string())
            .or_insert_with(|| Arc::new(InMemoryVectorStore::new(vector_collection_name(user), embedder)))
            .clone();
        Ok(store)
    }

    async fn chat_model(&self) -> Result<Arc<dyn ChatModel>> {
        Ok(Arc::clone(&self.model))
    }

    async fn history_store(&self) -> Result<Arc<dyn ChatHistoryStore>> {
        let history: Arc<dyn ChatHistoryStore> = self.history.clone();
        Ok(history)
    }
}
