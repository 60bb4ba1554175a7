use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use ragchat_core::ChatSession;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Log failed requests with the chat session they ran in
pub async fn handle_errors(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let route = format!("{} {}", req.method(), req.uri().path());

    let response = next.run(req).await;

    let elapsed = start.elapsed();
    let status = response.status();
    let session = session_label(&response);

    if status.is_server_error() {
        error!(%session, "{} failed: {} after {:?}", route, status, elapsed);
    } else if status.is_client_error() && status != StatusCode::NOT_FOUND {
        warn!(%session, "{} rejected: {} after {:?}", route, status, elapsed);
    }

    response
}

/// Session key attached by the session guard, or `anonymous`
fn session_label(response: &Response) -> String {
    response
        .extensions()
        .get::<Arc<ChatSession>>()
        .map(|session| session.session_key())
        .unwrap_or_else(|| "anonymous".to_string())
}
