//! HTTP front end for the ragchat assistant
//!
//! Every page interaction is a request: sign in, fetch the session view, ask
//! a question (answer streamed as server-sent events), upload context, clear
//! memory or context, sign out.

pub mod api;
pub mod core;
pub mod middleware;
pub mod models;
pub mod utils;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use crate::core::config::Settings;
pub use crate::core::state::AppState;

use crate::middleware::{error_handler, request_id};

/// Build the router over an already assembled state
pub fn create_app(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.settings.ingest.max_upload_bytes);
    let session_routes = Router::new()
        .route("/v1/session", get(api::session::get_session))
        .route("/v1/chat", post(api::chat::chat))
        .route(
            "/v1/context",
            post(api::context::upload_context)
                .layer(upload_limit)
                .delete(api::context::delete_context),
        )
        .route("/v1/memory", delete(api::memory::delete_memory))
        .route("/v1/logout", post(api::auth::logout))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            crate::core::auth::require_session,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(api::stats::get_stats))
        .route("/v1/login", post(api::auth::login))
        .merge(session_routes)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .map_response(|res: axum::http::Response<_>| res.map(axum::body::Body::new))
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(error_handler::handle_errors))
                .layer(axum_middleware::from_fn(request_id::add_request_id)),
        )
}

async fn health_check() -> &'static str {
    "OK"
}
