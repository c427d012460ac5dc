use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::session::machine::SessionError;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("upload failed: {0}")]
    Upload(#[from] MultipartError),
    #[error("scan task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, Option<&'static str>) {
        match self {
            ApiError::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, "E_VALIDATION", Some(e.field)),
            ApiError::Session(SessionError::NotFound) => (StatusCode::NOT_FOUND, "E_SESSION_NOT_FOUND", None),
            ApiError::Session(SessionError::Busy) => (StatusCode::CONFLICT, "E_BUSY", None),
            ApiError::Session(SessionError::NoModeSelected | SessionError::WrongMode { .. }) => {
                (StatusCode::CONFLICT, "E_MODE", None)
            }
            ApiError::Upload(e) => (e.status(), "E_UPLOAD", None),
            ApiError::Task(_) => (StatusCode::INTERNAL_SERVER_ERROR, "E_INTERNAL", None),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, field) = self.parts();
        let message = match &self {
            ApiError::Validation(e) => e.message.to_string(),
            other => other.to_string(),
        };
        if status.is_client_error() {
            tracing::debug!(%status, code, %message, "request rejected");
        } else if status.is_server_error() {
            tracing::error!(%status, code, %message, "request failed");
        }
        (status, Json(ErrorBody { code, message, field })).into_response()
    }
}
