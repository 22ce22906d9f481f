use crate::error::ProcessingError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Processing(ProcessingError::Decode(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Processing(e) if e.is_dependency_failure() => StatusCode::BAD_GATEWAY,
            AppError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Processing(e) => {
                tracing::error!("Request failed ({:?}): {}", e.kind(), e);
                json!({ "error": e.to_string(), "kind": e.kind() })
            }
            AppError::BadRequest(msg) => json!({ "error": msg, "kind": "bad_request" }),
            AppError::PayloadTooLarge(msg) => json!({ "error": msg, "kind": "payload_too_large" }),
        };

        (status, Json(body)).into_response()
    }
}
