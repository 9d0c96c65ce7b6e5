//! HTTP error response conversion for pipeline failures.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rescale_infra::ErrorResponse;
use rescale_processing::PipelineError;

/// Errors returned by the event endpoint.
///
/// Wraps foreign error types so `IntoResponse` can be implemented here.
#[derive(Debug)]
pub enum HttpError {
    InvalidEvent(String),
    Pipeline(PipelineError),
    Internal(anyhow::Error),
}

impl From<PipelineError> for HttpError {
    fn from(err: PipelineError) -> Self {
        HttpError::Pipeline(err)
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        HttpError::InvalidEvent(rejection.body_text())
    }
}

impl From<anyhow::Error> for HttpError {
    fn from(err: anyhow::Error) -> Self {
        HttpError::Internal(err)
    }
}

fn pipeline_error_type(err: &PipelineError) -> &'static str {
    match err {
        PipelineError::InvalidKey(_) => "invalid_key",
        PipelineError::Scratch { .. } => "scratch",
        PipelineError::Download(_) => "download",
        PipelineError::Decode { .. } => "decode",
        PipelineError::Resize(_) => "resize",
        PipelineError::Upload(_) => "upload",
        PipelineError::SignUrl(_) => "sign_url",
        PipelineError::DeleteOriginal(_) => "delete_original",
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            HttpError::InvalidEvent(message) => {
                tracing::debug!(error = %message, "Rejected event body");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("Invalid event")
                        .with_details(message.clone())
                        .with_type("invalid_event"),
                )
            }
            HttpError::Pipeline(err) => {
                // 5xx makes push deliveries retry
                let status = if err.is_retryable() {
                    StatusCode::INTERNAL_SERVER_ERROR
                } else {
                    StatusCode::UNPROCESSABLE_ENTITY
                };
                (
                    status,
                    ErrorResponse::new(err.to_string())
                        .with_details(format!("stage: {}", err.stage()))
                        .with_type(pipeline_error_type(err)),
                )
            }
            HttpError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error").with_type("internal"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
