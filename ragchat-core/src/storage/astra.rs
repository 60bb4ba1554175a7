//! Astra DB Data API backends
//!
//! Both the per-user vector collection and the shared chat-history
//! collection are plain JSON command endpoints:
//! `POST {endpoint}/api/json/v1/{keyspace}/{collection}`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{RagError, Result};
use crate::memory::ChatHistoryStore;
use crate::retrieval::{Embedder, VectorStore};
use crate::types::{Document, DocumentMetadata, Message, Role};

const SERVICE: &str = "Astra DB";

/// Maximum documents accepted by one insertMany command
pub const INSERT_BATCH_SIZE: usize = 20;

/// Where and how to reach an Astra DB database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstraConfig {
    pub api_endpoint: String,
    pub token: String,
    #[serde(default = "default_keyspace")]
    pub keyspace: String,
}

fn default_keyspace() -> String {
    "default_keyspace".to_string()
}

/// Thin client for one keyspace of the Data API
#[derive(Clone)]
pub struct AstraClient {
    http: Client,
    base_url: String,
}

impl AstraClient {
    pub fn new(config: &AstraConfig) -> Result<Self> {
        if config.api_endpoint.trim().is_empty() {
            return Err(RagError::ConfigError(
                "missing Astra DB api endpoint".to_string(),
            ));
        }
        if config.token.trim().is_empty() {
            return Err(RagError::ConfigError("missing Astra DB token".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "Token",
            HeaderValue::from_str(config.token.trim())
                .map_err(|_| RagError::ConfigError("invalid Astra DB token".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            base_url: format!(
                "{}/api/json/v1/{}",
                config.api_endpoint.trim_end_matches('/'),
                config.keyspace
            ),
        })
    }

    /// Create a collection if it does not exist yet
    pub async fn create_collection(&self, name: &str, vector_dimension: Option<usize>) -> Result<()> {
        let options = match vector_dimension {
            Some(dimension) => json!({"vector": {"dimension": dimension, "metric": "cosine"}}),
            None => json!({}),
        };
        self.command(
            &self.base_url,
            json!({"createCollection": {"name": name, "options": options}}),
        )
        .await?;
        info!("Ensured Astra DB collection {}", name);
        Ok(())
    }

    /// Handle to a collection of this keyspace
    pub fn collection(&self, name: &str) -> AstraCollection {
        AstraCollection {
            client: self.clone(),
            url: format!("{}/{}", self.base_url, name),
            name: name.to_string(),
        }
    }

    async fn command(&self, url: &str, body: Value) -> Result<Value> {
        let resp = self.http.post(url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RagError::UpstreamError {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = resp.json().await?;
        if let Some(errors) = value.get("errors").and_then(Value::as_array)
            && !errors.is_empty()
        {
            return Err(RagError::UpstreamError {
                service: SERVICE,
                status: status.as_u16(),
                body: Value::Array(errors.clone()).to_string(),
            });
        }
        Ok(value)
    }
}

/// A single Data API collection
#[derive(Clone)]
pub struct AstraCollection {
    client: AstraClient,
    url: String,
    name: String,
}

impl AstraCollection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn insert_many(&self, documents: Vec<Value>) -> Result<usize> {
        let mut inserted = 0;
        for batch in documents.chunks(INSERT_BATCH_SIZE) {
            let response = self
                .client
                .command(
                    &self.url,
                    json!({"insertMany": {"documents": batch, "options": {"ordered": false}}}),
                )
                .await?;
            inserted += response
                .pointer("/status/insertedIds")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
        }
        Ok(inserted)
    }

    /// One page of a find command: documents plus the next page state, if any
    pub async fn find_page(&self, find: Value) -> Result<(Vec<Value>, Option<String>)> {
        let response = self.client.command(&self.url, json!({"find": find})).await?;
        let documents = response
            .pointer("/data/documents")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| RagError::UnexpectedResponse {
                service: SERVICE,
                message: "find response without data.documents".to_string(),
            })?;
        let next = response
            .pointer("/data/nextPageState")
            .and_then(Value::as_str)
            .map(String::from);
        Ok((documents, next))
    }

    /// Delete everything matching `filter`, looping while the server reports more data
    pub async fn delete_many(&self, filter: Value) -> Result<u64> {
        let mut deleted = 0;
        loop {
            let response = self
                .client
                .command(&self.url, json!({"deleteMany": {"filter": filter}}))
                .await?;
            deleted += response
                .pointer("/status/deletedCount")
                .and_then(Value::as_i64)
                .map(|n| n.max(0) as u64)
                .unwrap_or(0);
            let more = response
                .pointer("/status/moreData")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !more {
                return Ok(deleted);
            }
        }
    }
}

/// Per-user vector collection
pub struct AstraVectorStore {
    collection: AstraCollection,
    embedder: Arc<dyn Embedder>,
}

impl AstraVectorStore {
    /// Connect and make sure the collection exists with the embedder's dimension
    pub async fn connect(
        config: &AstraConfig,
        collection_name: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let client = AstraClient::new(config)?;
        client
            .create_collection(collection_name, Some(embedder.dimension()))
            .await?;
        Ok(Self {
            collection: client.collection(collection_name),
            embedder,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StoredChunk {
    content: String,
    metadata: DocumentMetadata,
}

#[async_trait]
impl VectorStore for AstraVectorStore {
    async fn add_documents(&self, documents: Vec<Document>) -> Result<usize> {
        let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;

        let payload = documents
            .into_iter()
            .zip(vectors)
            .map(|(doc, vector)| {
                json!({
                    "_id": Uuid::new_v4().to_string(),
                    "content": doc.page_content,
                    "metadata": doc.metadata,
                    "$vector": vector,
                })
            })
            .collect();

        let inserted = self.collection.insert_many(payload).await?;
        info!(
            "Inserted {} chunks into {}",
            inserted,
            self.collection.name()
        );
        Ok(inserted)
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        let vector = self.embedder.embed_query(query).await?;
        let (documents, _) = self
            .collection
            .find_page(json!({
                "sort": {"$vector": vector},
                "projection": {"content": 1, "metadata": 1},
                "options": {"limit": k},
            }))
            .await?;

        documents
            .into_iter()
            .map(|value| {
                let chunk: StoredChunk = serde_json::from_value(value)?;
                Ok(Document {
                    page_content: chunk.content,
                    metadata: chunk.metadata,
                })
            })
            .collect()
    }

    async fn clear(&self) -> Result<()> {
        let deleted = self.collection.delete_many(json!({})).await?;
        info!(
            "Deleted {} chunks from {}",
            deleted,
            self.collection.name()
        );
        Ok(())
    }
}

/// Chat history in one shared collection, one document per message
pub struct AstraChatHistoryStore {
    collection: AstraCollection,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredMessage {
    session_id: String,
    timestamp: i64,
    role: Role,
    content: String,
}

impl AstraChatHistoryStore {
    pub async fn connect(config: &AstraConfig, collection_name: &str) -> Result<Self> {
        let client = AstraClient::new(config)?;
        client.create_collection(collection_name, None).await?;
        Ok(Self {
            collection: client.collection(collection_name),
        })
    }
}

#[async_trait]
impl ChatHistoryStore for AstraChatHistoryStore {
    async fn messages(&self, session_key: &str) -> Result<Vec<Message>> {
        let mut stored = Vec::new();
        let mut page_state: Option<String> = None;

        loop {
            let mut find = json!({"filter": {"session_id": session_key}});
            if let Some(state) = &page_state {
                find["options"] = json!({"pageState": state});
            }

            let (documents, next) = self.collection.find_page(find).await?;
            for value in documents {
                stored.push(serde_json::from_value::<StoredMessage>(value)?);
            }
            match next {
                Some(state) => page_state = Some(state),
                None => break,
            }
        }

        // Sorted queries are not paged by the Data API, so order locally.
        stored.sort_by_key(|m| m.timestamp);
        debug!("Loaded {} history messages for {}", stored.len(), session_key);

        Ok(stored
            .into_iter()
            .map(|m| Message {
                role: m.role,
                content: m.content,
                created_at: DateTime::<Utc>::from_timestamp_micros(m.timestamp)
                    .unwrap_or_else(Utc::now),
            })
            .collect())
    }

    async fn append(&self, session_key: &str, message: Message) -> Result<()> {
        let stored = StoredMessage {
            session_id: session_key.to_string(),
            timestamp: message.created_at.timestamp_micros(),
            role: message.role,
            content: message.content,
        };
        self.collection
            .insert_many(vec![serde_json::to_value(stored)?])
            .await?;
        Ok(())
    }

    async fn clear(&self, session_key: &str) -> Result<()> {
        let deleted = self
            .collection
            .delete_many(json!({"session_id": session_key}))
            .await?;
        info!("Deleted {} history messages for {}", deleted, session_key);
        Ok(())
    }
}
