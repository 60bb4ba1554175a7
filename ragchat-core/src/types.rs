//! Shared value types: chat messages, remembered exchanges and documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The signed-in user
    Human,
    /// The assistant (including the synthetic welcome message)
    Assistant,
}

impl Role {
    /// Label used when chat history is rendered into a prompt
    pub fn prompt_label(&self) -> &'static str {
        match self {
            Role::Human => "Human",
            Role::Assistant => "AI",
        }
    }
}

/// One entry of a session's message log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote it
    pub role: Role,
    /// Markdown content
    pub content: String,
    /// When it was appended
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a human message
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// A remembered question/answer pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// What the user asked
    pub question: String,
    /// The full answer, sources footer included
    pub answer: String,
}

impl Exchange {
    /// Create a new exchange
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Metadata carried by every indexed chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Originating file name (or path)
    pub source: String,
    /// Character offset of the chunk inside its page or file
    #[serde(default)]
    pub start_index: usize,
    /// Zero-based page number for PDF uploads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// A chunk of text, either about to be indexed or returned by a retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Chunk text
    pub page_content: String,
    /// Where it came from
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a document for the given source with offset 0
    pub fn new(page_content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: DocumentMetadata {
                source: source.into(),
                start_index: 0,
                page: None,
            },
        }
    }

    /// Last path component of the source, as shown to the user
    pub fn source_name(&self) -> String {
        source_basename(&self.metadata.source)
    }
}

/// Basename of a source identifier, ignoring trailing separators
pub fn source_basename(source: &str) -> String {
    let trimmed = source.trim_end_matches(['/', '\\']);
    Path::new(trimmed)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| trimmed.to_string())
}
