//! HTTP mapping of library errors.

use crate::error::PdfChatError;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// An error rendered as `{"detail": message}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }
}

/// Keeps the status axum assigns, so an oversized upload is a 413.
impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            detail: format!("Failed to read upload: {}", err.body_text()),
        }
    }
}

impl From<PdfChatError> for ApiError {
    fn from(err: PdfChatError) -> Self {
        let status = match &err {
            PdfChatError::NotFound { .. } => StatusCode::NOT_FOUND,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", err);
        }
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (
                PdfChatError::NotFound { key: "a/a.md".into() },
                StatusCode::NOT_FOUND,
            ),
            (
                PdfChatError::NotAPdf {
                    name: "x".into(),
                    magic: b"PK".to_vec(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                PdfChatError::WrongPassword { name: "x".into() },
                StatusCode::BAD_REQUEST,
            ),
            (
                PdfChatError::storage("a/a.pdf", "denied"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PdfChatError::Cache("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }
}
