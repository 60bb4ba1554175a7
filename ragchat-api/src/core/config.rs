use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, builder::DefaultState};
use ragchat_core::OpenAiConfig;
use ragchat_core::ingest::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use ragchat_core::locale::DEFAULT_RAILS_USER;
use ragchat_core::resources::{ResourceSettings, UserStorage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub openai: OpenAiConfig,
    pub retrieval: RetrievalConfig,
    pub ingest: IngestConfig,
    pub content: ContentConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub users: HashMap<String, UserConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub secret_key: String,
    pub token_expiry_hours: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    pub top_k_vectorstore: usize,
    pub top_k_memory: usize,
    #[serde(default)]
    pub reuse_context_for_sources: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Body limit of a context upload request
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContentConfig {
    pub localization_path: String,
    pub rails_path: String,
    pub welcome_dir: String,
    pub default_rails_user: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Astra,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(default)]
    pub history_endpoint: String,
    #[serde(default)]
    pub history_token: String,
    pub keyspace: String,
    pub history_collection: String,
}

/// A user allowed to sign in
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UserConfig {
    /// Argon2 PHC string
    pub password_hash: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub astra_token: String,
    #[serde(default)]
    pub astra_endpoint: String,
    #[serde(default)]
    pub delete_option: bool,
}

/// Largest accepted context upload, 200 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

fn default_language() -> String {
    "en_US".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = with_defaults(Config::builder())?
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("RAGCHAT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Defaults overlaid with a TOML document, without files or environment
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        with_defaults(Config::builder())?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn resource_settings(&self) -> ResourceSettings {
        ResourceSettings {
            top_k_vectorstore: self.retrieval.top_k_vectorstore,
            top_k_memory: self.retrieval.top_k_memory,
        }
    }

    pub fn user_storage(&self) -> HashMap<String, UserStorage> {
        self.users
            .iter()
            .map(|(name, user)| {
                (
                    name.clone(),
                    UserStorage {
                        api_endpoint: user.astra_endpoint.clone(),
                        token: user.astra_token.clone(),
                    },
                )
            })
            .collect()
    }
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let openai = OpenAiConfig::default();
    builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("auth.secret_key", "change-me-in-production")?
        .set_default("auth.token_expiry_hours", 24)?
        .set_default("openai.api_key", "")?
        .set_default("openai.base_url", openai.base_url)?
        .set_default("openai.chat_model", openai.chat_model)?
        .set_default("openai.temperature", f64::from(openai.temperature))?
        .set_default("openai.embedding_model", openai.embedding_model)?
        .set_default("openai.embedding_dimension", openai.embedding_dimension as i64)?
        .set_default("openai.embedding_batch_size", openai.embedding_batch_size as i64)?
        .set_default("retrieval.top_k_vectorstore", 4)?
        .set_default("retrieval.top_k_memory", 3)?
        .set_default("retrieval.reuse_context_for_sources", false)?
        .set_default("ingest.chunk_size", DEFAULT_CHUNK_SIZE as i64)?
        .set_default("ingest.chunk_overlap", DEFAULT_CHUNK_OVERLAP as i64)?
        .set_default("ingest.max_upload_bytes", DEFAULT_MAX_UPLOAD_BYTES as i64)?
        .set_default("content.localization_path", "content/localization.csv")?
        .set_default("content.rails_path", "content/rails.csv")?
        .set_default("content.welcome_dir", "content")?
        .set_default("content.default_rails_user", DEFAULT_RAILS_USER)?
        .set_default("storage.backend", "astra")?
        .set_default("storage.keyspace", "default_keyspace")?
        .set_default("storage.history_collection", "chat_history")
}
