//! Prompt template for the retrieval-augmented turn

use serde::{Deserialize, Serialize};

use crate::types::{Document, Exchange, Role};

/// The assistant's fixed instructions
pub const SYSTEM_TEMPLATE: &str = "You're a helpful AI assistent tasked to answer the user's questions.
You're friendly and you answer extensively with multiple sentences. You prefer to use bulletpoints to summarize.
If you don't know the answer, just say 'I do not know the answer'.

Use the following context to answer the question:
{context}

Use the previous chat history to answer the question:
{chat_history}

Question:
{question}

Answer in the user's language:";

/// Role of a prompt message sent to the chat model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

/// Fully rendered input for one model call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPrompt {
    pub messages: Vec<PromptMessage>,
}

impl ChatPrompt {
    /// Concatenated text of all messages, mainly for logging and assertions
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// System-message template with `{context}`, `{chat_history}` and `{question}` slots
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(SYSTEM_TEMPLATE)
    }
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Substitute the three slots and wrap the result as a single system message
    pub fn render(&self, context: &[Document], history: &[Exchange], question: &str) -> ChatPrompt {
        let context = render_context(context);
        let chat_history = render_history(history);
        let content = substitute(&self.template, |slot| match slot {
            "context" => Some(context.as_str()),
            "chat_history" => Some(chat_history.as_str()),
            "question" => Some(question),
            _ => None,
        });

        ChatPrompt {
            messages: vec![PromptMessage {
                role: PromptRole::System,
                content,
            }],
        }
    }
}

/// Single pass over the template: substituted text is never rescanned for slots.
fn substitute<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}').and_then(|close| lookup(&after[..close]).map(|v| (close, v))) {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            },
            None => {
                out.push('{');
                rest = after;
            },
        }
    }
    out.push_str(rest);
    out
}

fn render_context(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|doc| format!("[{}]\n{}", doc.source_name(), doc.page_content.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_history(history: &[Exchange]) -> String {
    let mut lines = Vec::with_capacity(history.len() * 2);
    for exchange in history {
        lines.push(format!("{}: {}", Role::Human.prompt_label(), exchange.question));
        lines.push(format!(
            "{}: {}",
            Role::Assistant.prompt_label(),
            exchange.answer
        ));
    }
    lines.join("\n")
}
