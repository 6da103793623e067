use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::detect::DetectError;

/// Handler error: validation failures are the client's fault, anything else is ours.
#[derive(Debug)]
pub enum ApiError {
    Validation(DetectError),
    /// Body that is not JSON or does not fit the expected shape.
    Payload(JsonRejection),
    Internal(anyhow::Error),
}

impl From<DetectError> for ApiError {
    fn from(e: DetectError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Payload(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(e) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": e.to_string() }))).into_response()
            }
            ApiError::Payload(e) => (e.status(), Json(json!({ "error": e.body_text() }))).into_response(),
            ApiError::Internal(e) => {
                tracing::error!(error = %format!("{:#}", e), "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "internal error" }))).into_response()
            }
        }
    }
}
