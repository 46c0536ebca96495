// Mapping of domain errors onto HTTP responses
use crate::domain::error::ConfigError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError(pub ConfigError);

impl From<ConfigError> for ApiError {
    fn from(error: ConfigError) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ConfigError::NotLoaded(_) => StatusCode::NOT_FOUND,
            ConfigError::NotFound { .. } | ConfigError::DuplicateId { .. } => StatusCode::CONFLICT,
            ConfigError::IdentityChanged { .. } | ConfigError::CollisionUnresolved { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ConfigError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "Request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
