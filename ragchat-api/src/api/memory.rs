use axum::{Extension, Json, extract::State};
use ragchat_core::ChatSession;
use std::sync::Arc;
use tracing::info;

use crate::{
    core::state::AppState,
    models::{api::StatusResponse, error::ApiResult},
};

/// Forget the remembered exchanges of this session
pub async fn delete_memory(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<ChatSession>>,
) -> ApiResult<Json<StatusResponse>> {
    let memory = state.resources.memory(&session.session_key()).await?;
    memory.clear().await?;

    info!("Cleared memory of {}", session.session_key());
    let strings = state.catalog.strings(session.language());
    Ok(Json(StatusResponse::ok(strings.get("deleting_memory"))))
}
