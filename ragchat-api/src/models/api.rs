use ragchat_core::locale::Rail;
use ragchat_core::{IngestedFile, Message};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub session_id: String,
    pub user: String,
}

/// Everything the page needs to draw itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub user: String,
    pub session_id: String,
    pub language: String,
    pub messages: Vec<Message>,
    pub rails: Vec<Rail>,
    pub strings: HashMap<String, String>,
    /// Markdown shown above the conversation
    pub welcome: Option<String>,
    pub delete_context_allowed: bool,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub files: Vec<IngestedFile>,
    pub total_chunks: usize,
    /// Localized lines such as "3 chunks loaded from a text file"
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: Some(message.into()),
        }
    }
}
