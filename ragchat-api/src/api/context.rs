use axum::{
    Extension, Json,
    extract::{Multipart, State},
};
use ragchat_core::{ChatSession, FileKind, UploadedFile};
use std::sync::Arc;
use tracing::info;

use crate::{
    core::state::AppState,
    models::{
        api::{StatusResponse, UploadResponse},
        error::{ApiError, ApiResult},
    },
};

/// Index uploaded `.txt` and `.pdf` files into the user's collection
pub async fn upload_context(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<ChatSession>>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let Some(name) = field.file_name().map(String::from) else {
            continue;
        };
        let content = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read {name}: {e}")))?;
        files.push(UploadedFile::new(name, content));
    }
    if files.is_empty() {
        return Err(ApiError::BadRequest("no files uploaded".to_string()));
    }

    let store = state.resources.vector_store(session.user()).await?;
    let report = state.ingest.ingest(store.as_ref(), files).await?;

    let strings = state.catalog.strings(session.language());
    let messages = report
        .files
        .iter()
        .filter_map(|file| match file.kind {
            FileKind::Text => Some(format!("{} {}", file.chunks, strings.get("load_text"))),
            FileKind::Pdf => Some(format!("{} {}", file.chunks, strings.get("load_pdf"))),
            FileKind::Unsupported => None,
        })
        .collect();

    info!(
        "{} uploaded {} files ({} chunks)",
        session.user(),
        report.files.len(),
        report.total_chunks()
    );
    Ok(Json(UploadResponse {
        total_chunks: report.total_chunks(),
        files: report.files,
        messages,
    }))
}

/// Wipe the user's collection, the session memory and the message log
pub async fn delete_context(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<ChatSession>>,
) -> ApiResult<Json<StatusResponse>> {
    let allowed = state
        .settings
        .users
        .get(session.user())
        .is_some_and(|user| user.delete_option);
    if !allowed {
        return Err(ApiError::Forbidden(format!(
            "context deletion is disabled for {}",
            session.user()
        )));
    }

    let strings = state.catalog.strings(session.language());
    state.resources.vector_store(session.user()).await?.clear().await?;
    state
        .resources
        .memory(&session.session_key())
        .await?
        .clear()
        .await?;
    session.reset(strings.get("assistant_welcome"));

    info!("Deleted context of {}", session.user());
    Ok(Json(StatusResponse::ok(strings.get("deleting_context"))))
}
