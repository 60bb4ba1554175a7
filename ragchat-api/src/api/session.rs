use axum::{Extension, Json, extract::State};
use ragchat_core::ChatSession;
use std::sync::Arc;
use tracing::warn;

use crate::{
    core::state::AppState,
    models::{api::SessionView, error::ApiResult},
};

pub async fn get_session(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<ChatSession>>,
) -> ApiResult<Json<SessionView>> {
    let strings = state.catalog.strings(session.language());
    let rails = state.catalog.rails(session.user());
    let welcome = match state.catalog.welcome(session.user()).await {
        Ok(markdown) => Some(markdown),
        Err(e) => {
            warn!("No welcome page for {}: {}", session.user(), e);
            None
        },
    };
    let delete_context_allowed = state
        .settings
        .users
        .get(session.user())
        .is_some_and(|user| user.delete_option);

    Ok(Json(SessionView {
        user: session.user().to_string(),
        session_id: session.session_id().to_string(),
        language: session.language().to_string(),
        messages: session.messages(),
        rails: rails.as_ref().clone(),
        strings: strings.entries().clone(),
        welcome,
        delete_context_allowed,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
