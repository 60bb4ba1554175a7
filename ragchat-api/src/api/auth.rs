use axum::{Extension, Json, extract::State};
use ragchat_core::ChatSession;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    core::{auth::verify_password, state::AppState},
    models::{
        api::{LoginRequest, LoginResponse, StatusResponse},
        error::{ApiError, ApiResult},
    },
};

/// Check credentials and open a fresh chat session
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = state
        .settings
        .users
        .get(&request.username)
        .filter(|user| verify_password(&user.password_hash, &request.password))
        .ok_or_else(|| {
            warn!("Failed sign-in for {}", request.username);
            ApiError::Unauthorized("User not known or password incorrect".to_string())
        })?;

    let strings = state.catalog.strings(&user.language);
    let session = state.sessions.create_session(
        &request.username,
        &user.language,
        strings.get("assistant_welcome"),
    );
    let token = state
        .auth
        .generate_token(&request.username, session.session_id())
        .map_err(|e| ApiError::Internal(format!("failed to issue token: {e}")))?;

    info!("{} signed in", request.username);
    Ok(Json(LoginResponse {
        token,
        session_id: session.session_id().to_string(),
        user: request.username,
    }))
}

/// End the session and drop every cached collaborator
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<ChatSession>>,
) -> ApiResult<Json<StatusResponse>> {
    state.sessions.remove(session.session_id());
    state.resources.clear_all();

    info!("{} signed out", session.user());
    Ok(Json(StatusResponse::ok("Signed out")))
}
