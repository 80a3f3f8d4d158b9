use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the alert store and lifecycle service.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("storage error: {0}")]
    Storage(#[from] sea_orm::DbErr),
    /// User/pet directory or fan-out transport failure.
    #[error("collaborator unavailable: {0}")]
    Collaborator(String),
}

impl AlertError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn alert_not_found(id: uuid::Uuid) -> Self {
        Self::NotFound(format!("alert {} does not exist", id))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AlertError::Validation(_) => StatusCode::BAD_REQUEST,
            AlertError::NotFound(_) => StatusCode::NOT_FOUND,
            AlertError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AlertError::Forbidden(_) => StatusCode::FORBIDDEN,
            AlertError::Storage(_) | AlertError::Collaborator(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AlertError::Validation(_) => "VALIDATION_FAILED",
            AlertError::NotFound(_) => "NOT_FOUND",
            AlertError::Unauthorized(_) => "UNAUTHORIZED",
            AlertError::Forbidden(_) => "FORBIDDEN",
            AlertError::Storage(_) => "STORAGE_UNAVAILABLE",
            AlertError::Collaborator(_) => "COLLABORATOR_UNAVAILABLE",
        }
    }
}

impl From<JsonRejection> for AlertError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("invalid request body: {}", err.body_text()),
            JsonRejection::JsonSyntaxError(err) => format!("malformed JSON: {}", err.body_text()),
            JsonRejection::MissingJsonContentType(_) => {
                "expected 'Content-Type: application/json'".to_string()
            }
            other => other.body_text(),
        };
        Self::Validation(message)
    }
}

impl From<QueryRejection> for AlertError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AlertError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for AlertError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "alert request failed");
        }
        tracing::Span::current().record("error", self.error_code());

        // Storage details stay in the logs.
        let message = match &self {
            AlertError::Storage(_) => "storage is temporarily unavailable".to_string(),
            other => other.to_string(),
        };

        (
            status,
            Json(json!({"error": self.error_code(), "message": message})),
        )
            .into_response()
    }
}

pub type AlertResult<T> = Result<T, AlertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_transport_status() {
        assert_eq!(
            AlertError::validation("title is required").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AlertError::alert_not_found(uuid::Uuid::nil()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AlertError::Storage(sea_orm::DbErr::Custom("down".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AlertError::Forbidden("not the reporter".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AlertError::Unauthorized("no key".into()).error_code(), "UNAUTHORIZED");
    }
}
