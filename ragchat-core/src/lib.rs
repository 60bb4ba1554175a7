//! # ragchat-core
//!
//! Retrieval-augmented conversation engine: a per-session pipeline that
//! retrieves context, replays a short conversational memory, streams a model
//! answer and cites its sources.
//!
//! ## Features
//!
//! - **Conversation pipeline**: streamed turns with drafts and a sources footer
//! - **Memory window**: the last `k` exchanges of a session, backed by a history store
//! - **Resource cache**: memoized collaborator handles, cleared on logout
//! - **Ingestion**: `.txt` and `.pdf` uploads split into overlapping windows
//! - **Catalog**: localized strings, per-user rails and welcome pages
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use ragchat_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let model = Arc::new(ScriptedChatModel::new(["Hello", "!"]));
//!     let resources = Resources::new(
//!         Arc::new(InMemoryResourceFactory::new(model)),
//!         ResourceSettings::default(),
//!     );
//!
//!     let session = Arc::new(ChatSession::new("alice", "en_US", "Welcome"));
//!     let pipeline = ConversationPipeline::new(
//!         resources.retriever("alice").await?,
//!         resources.memory(&session.session_key()).await?,
//!         resources.model().await?,
//!     );
//!
//!     let mut events = pipeline.ask(&session, "Hi there")?;
//!     while let Some(event) = events.next().await {
//!         println!("{:?}", event?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
mod errors;
pub mod ingest;
pub mod locale;
pub mod memory;
pub mod model;
pub mod pipeline;
pub mod prompt;
pub mod resources;
pub mod retrieval;
pub mod session;
pub mod storage;
mod types;

pub use cache::{CacheStats, ResourceCache, ResourceKey};
pub use errors::{RagError, Result};
pub use ingest::{FileKind, IngestPipeline, IngestReport, IngestedFile, TextSplitter, UploadedFile};
pub use locale::{Catalog, LocaleStrings, Rail};
pub use memory::{ChatHistoryStore, InMemoryChatHistoryStore, MemoryWindow};
pub use model::{ChatModel, OpenAiChatModel, OpenAiConfig, OpenAiEmbedder, ScriptedChatModel, TokenStream};
pub use pipeline::{ConversationPipeline, PipelineConfig, TurnEvent, TurnStream};
pub use prompt::{ChatPrompt, PromptTemplate};
pub use resources::{
    HostedResourceFactory, InMemoryResourceFactory, ResourceFactory, ResourceSettings, Resources,
    UserStorage,
};
pub use retrieval::{Embedder, HashingEmbedder, InMemoryVectorStore, Retriever, VectorStore};
pub use session::{ChatSession, SessionId, TurnPhase};
pub use types::{Document, DocumentMetadata, Exchange, Message, Role, source_basename};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ChatSession, ConversationPipeline, InMemoryResourceFactory, IngestPipeline, RagError,
        ResourceSettings, Resources, Result, ScriptedChatModel, TurnEvent, UploadedFile,
    };
}
