//! Scripted chat model for testing and offline runs
use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use std::collections::VecDeque;

use super::{ChatModel, TokenStream};
use crate::errors::{RagError, Result};
use crate::prompt::ChatPrompt;

/// A chat model that replays configured token sequences
///
/// Each call consumes the next script; once only one script is left it is
/// replayed for every further call. Every received prompt is recorded.
pub struct ScriptedChatModel {
    scripts: Mutex<VecDeque<Vec<String>>>,
    fail_after: Option<usize>,
    prompts: Mutex<Vec<ChatPrompt>>,
}

impl ScriptedChatModel {
    /// Model that answers every prompt with the given tokens
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scripts: Mutex::new(VecDeque::from([tokens
                .into_iter()
                .map(Into::into)
                .collect()])),
            fail_after: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue another answer for a later call
    pub fn then<I, S>(self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts
            .lock()
            .push_back(tokens.into_iter().map(Into::into).collect());
        self
    }

    /// Emit an upstream error after `tokens` increments, simulating a dropped connection
    pub fn failing_after(mut self, tokens: usize) -> Self {
        self.fail_after = Some(tokens);
        self
    }

    /// All prompts received so far
    pub fn prompts(&self) -> Vec<ChatPrompt> {
        self.prompts.lock().clone()
    }

    fn next_script(&self) -> Vec<String> {
        let mut scripts = self.scripts.lock();
        if scripts.len() > 1 {
            scripts.pop_front().unwrap_or_default()
        } else {
            scripts.front().cloned().unwrap_or_default()
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn stream(&self, prompt: ChatPrompt) -> Result<TokenStream> {
        self.prompts.lock().push(prompt);

        let mut items: Vec<Result<String>> = self.next_script().into_iter().map(Ok).collect();
        if let Some(limit) = self.fail_after {
            items.truncate(limit);
            items.push(Err(RagError::UpstreamError {
                service: "scripted model",
                status: 502,
                body: "connection reset".to_string(),
            }));
        }

        Ok(Box::pin(stream::iter(items)))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_scripts_are_consumed_in_order() {
        let model = ScriptedChatModel::new(["a", "b"]).then(["c"]);

        let first: Vec<_> = model.stream(ChatPrompt::default()).await.unwrap().collect().await;
        let second: Vec<_> = model.stream(ChatPrompt::default()).await.unwrap().collect().await;
        let third: Vec<_> = model.stream(ChatPrompt::default()).await.unwrap().collect().await;

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert_eq!(third.len(), 1);
        assert_eq!(model.prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_failing_after() {
        let model = ScriptedChatModel::new(["a", "b", "c"]).failing_after(1);
        let items: Vec<_> = model.stream(ChatPrompt::default()).await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
