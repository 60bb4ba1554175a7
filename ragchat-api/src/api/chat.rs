use axum::{
    Extension, Json,
    extract::State,
    response::{IntoResponse, Response},
};
use ragchat_core::{ChatSession, ConversationPipeline, PipelineConfig};
use std::sync::Arc;
use tracing::debug;

use crate::{
    core::state::AppState,
    models::{api::ChatRequest, error::ApiResult},
    utils::streaming::turn_sse,
};

/// Ask a question; the answer streams back as server-sent events
pub async fn chat(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<ChatSession>>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Response> {
    let resources = &state.resources;
    let strings = state.catalog.strings(session.language());

    let pipeline = ConversationPipeline::new(
        resources.retriever(session.user()).await?,
        resources.memory(&session.session_key()).await?,
        resources.model().await?,
    )
    .with_config(PipelineConfig {
        reuse_context_for_sources: state.settings.retrieval.reuse_context_for_sources,
        sources_label: strings.get("sources_used").to_string(),
    });

    let turn = pipeline.ask(&session, &request.question)?;
    debug!("Streaming answer for {}", session.session_key());
    Ok(turn_sse(turn).into_response())
}
