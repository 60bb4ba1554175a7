use axum::{Json, extract::State, response::IntoResponse};
use ragchat_core::CacheStats;
use serde::Serialize;

use crate::{core::state::AppState, models::error::ApiResult};

#[derive(Debug, Serialize)]
pub struct SystemStats {
    pub cache: CacheStats,
    pub active_sessions: usize,
    pub uptime_secs: u64,
    pub version: &'static str,
}

pub async fn get_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let stats = SystemStats {
        cache: state.resources.stats(),
        active_sessions: state.sessions.count(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
    };

    Ok(Json(stats))
}
