use anyhow::Context;
use ragchat_core::storage::AstraConfig;
use ragchat_core::{
    Catalog, ChatModel, HostedResourceFactory, InMemoryResourceFactory, IngestPipeline,
    OpenAiChatModel, ResourceFactory, Resources, ScriptedChatModel, TextSplitter,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::auth::AuthManager;
use crate::core::config::{Settings, StorageBackend};
use crate::core::session_manager::SessionManager;

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub auth: Arc<AuthManager>,
    pub sessions: Arc<SessionManager>,
    pub resources: Resources,
    pub catalog: Arc<Catalog>,
    pub ingest: IngestPipeline,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(settings: Settings, factory: Arc<dyn ResourceFactory>, catalog: Catalog) -> anyhow::Result<Self> {
        let splitter = TextSplitter::new(settings.ingest.chunk_size, settings.ingest.chunk_overlap)
            .context("invalid ingest settings")?;

        Ok(Self {
            auth: Arc::new(AuthManager::new(
                settings.auth.secret_key.clone(),
                settings.auth.token_expiry_hours,
            )),
            sessions: Arc::new(SessionManager::new(session_ttl(settings.auth.token_expiry_hours))),
            resources: Resources::new(factory, settings.resource_settings()),
            catalog: Arc::new(catalog),
            ingest: IngestPipeline::new(splitter),
            started_at: Instant::now(),
            settings: Arc::new(settings),
        })
    }

    /// Load the catalog and pick collaborators according to `storage.backend`
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let catalog = Catalog::load(
            &settings.content.localization_path,
            &settings.content.rails_path,
            &settings.content.welcome_dir,
        )
        .context("failed to load localization and rails")?
        .with_default_rails_user(settings.content.default_rails_user.clone());

        let factory: Arc<dyn ResourceFactory> = match settings.storage.backend {
            StorageBackend::Astra => {
                info!("Using Astra DB storage and OpenAI models");
                Arc::new(HostedResourceFactory::new(
                    settings.openai.clone(),
                    AstraConfig {
                        api_endpoint: settings.storage.history_endpoint.clone(),
                        token: settings.storage.history_token.clone(),
                        keyspace: settings.storage.keyspace.clone(),
                    },
                    settings.storage.history_collection.clone(),
                    settings.user_storage(),
                ))
            },
            StorageBackend::Memory => {
                let model: Arc<dyn ChatModel> = if settings.openai.api_key.trim().is_empty() {
                    warn!("No OpenAI API key configured, answers come from a scripted model");
                    Arc::new(ScriptedChatModel::new(["I do not know the answer."]))
                } else {
                    Arc::new(OpenAiChatModel::new(&settings.openai)?)
                };
                info!("Using in-memory storage with model {}", model.model_name());
                Arc::new(InMemoryResourceFactory::new(model))
            },
        };

        Self::new(settings, factory, catalog)
    }

    /// Drop expired sessions together with their cached memory windows
    pub fn sweep_expired_sessions(&self) -> usize {
        let expired = self.sessions.remove_expired();
        for session in &expired {
            self.resources.forget_memory(&session.session_key());
        }
        expired.len()
    }

    /// Sweep expired sessions every `period` for the life of the process
    pub fn spawn_session_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                let swept = state.sweep_expired_sessions();
                if swept > 0 {
                    info!("Swept {} expired sessions", swept);
                } else {
                    debug!("No expired sessions, {} live", state.sessions.count());
                }
            }
        })
    }
}

fn session_ttl(expiry_hours: i64) -> Duration {
    Duration::from_secs(u64::try_from(expiry_hours).unwrap_or(0).saturating_mul(3600))
}
