use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ragchat_core::RagError;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, Option<&'static str>) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", None),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "authentication_error", None),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "permission_error", None),
            ApiError::Conflict(_) => (
                StatusCode::CONFLICT,
                "invalid_request_error",
                Some("turn_in_progress"),
            ),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error", None),
            ApiError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                None,
            ),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        }
    }

    /// Body shared by JSON responses and SSE `error` events
    pub fn detail(&self) -> ErrorDetail {
        let (_, error_type, code) = self.parts();
        ErrorDetail {
            message: self.to_string(),
            r#type: error_type.to_string(),
            code: code.map(String::from),
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::TurnInProgress(_) => ApiError::Conflict(err.to_string()),
            RagError::ConfigError(_) => ApiError::Config(err.to_string()),
            RagError::HttpError(_)
            | RagError::UpstreamError { .. }
            | RagError::UnexpectedResponse { .. }
            | RagError::UnexpectedStreamEnd => ApiError::Upstream(err.to_string()),
            err if err.is_client_error() => ApiError::BadRequest(err.to_string()),
            err => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, _, _) = self.parts();
        let error_response = ErrorResponse {
            error: self.detail(),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
