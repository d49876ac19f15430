//! Mapping of [`SkillshareError`] onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::error::SkillshareError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// An error response: `{"error": message}` with a non-2xx status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

#[must_use]
pub const fn status_for(err: &SkillshareError) -> StatusCode {
    match err {
        SkillshareError::NotFound(_) => StatusCode::NOT_FOUND,
        SkillshareError::Conflict(_) => StatusCode::CONFLICT,
        SkillshareError::AuditBlocked(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SkillshareError::InvalidInput(_) | SkillshareError::Config(_) => StatusCode::BAD_REQUEST,
        SkillshareError::LockTimeout(_) => StatusCode::LOCKED,
        SkillshareError::MissingConfig(_)
        | SkillshareError::Serialization(_)
        | SkillshareError::Io(_)
        | SkillshareError::Git(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<SkillshareError> for ApiError {
    fn from(err: SkillshareError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            error!(code = err.code(), error = %err, "request failed");
        } else {
            warn!(code = err.code(), error = %err, "request rejected");
        }
        Self::new(status, err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        error!(error = %err, "blocking task failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal task failure")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (SkillshareError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (SkillshareError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                SkillshareError::AuditBlocked("security audit failed".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (SkillshareError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (SkillshareError::Config("x".into()), StatusCode::BAD_REQUEST),
            (SkillshareError::LockTimeout("x".into()), StatusCode::LOCKED),
            (SkillshareError::MissingConfig("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(status_for(&err), status, "{err}");
        }
    }

    #[test]
    fn audit_message_passes_through() {
        let api: ApiError = SkillshareError::AuditBlocked("security audit failed: 1 CRITICAL".into()).into();
        assert_eq!(api.message, "security audit failed: 1 CRITICAL");
    }
}
