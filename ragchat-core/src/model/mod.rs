//! Chat-model collaborators
//!
//! A model receives a rendered [`ChatPrompt`] and answers with a stream of
//! text increments. The stream ends when the model has finished.

mod mock;
mod openai;

use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

use crate::errors::Result;
use crate::prompt::ChatPrompt;

pub use mock::ScriptedChatModel;
pub use openai::{OpenAiChatModel, OpenAiConfig, OpenAiEmbedder};

/// Stream of incremental tokens produced by a chat model
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send + 'static>>;

/// Streaming chat completion
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Submit the prompt with streaming enabled
    async fn stream(&self, prompt: ChatPrompt) -> Result<TokenStream>;

    /// Model identifier, for logs and the stats endpoint
    fn model_name(&self) -> &str;
}
