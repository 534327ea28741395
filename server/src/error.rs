use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use spectro_core::PipelineError;
use thiserror::Error;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported audio: {0}")]
    UnsupportedAudio(String),

    #[error("Render error: {0}")]
    RenderError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::InputFormat(msg) => ApiError::InvalidInput(msg),
            PipelineError::Decode(msg) => ApiError::UnsupportedAudio(msg),
            PipelineError::Render(msg) => ApiError::RenderError(msg),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::UnsupportedAudio(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, format!("Could not decode audio: {msg}"))
            }
            ApiError::RenderError(msg) => {
                tracing::error!("Render error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Render error: {msg}"))
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_errors_map_to_status() {
        let cases = [
            (PipelineError::InputFormat("x".into()), StatusCode::BAD_REQUEST),
            (PipelineError::Decode("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (PipelineError::Render("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
