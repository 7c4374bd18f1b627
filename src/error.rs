use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::messages::CaptionResponse;

/// Errors that can occur while serving a caption request.
///
/// Each variant is built where the failure happens and maps to exactly one
/// HTTP status code.
#[derive(Debug, thiserror::Error)]
pub enum CaptionError {
    /// The request body did not carry a usable `image_url`.
    #[error("{0}")]
    Validation(String),

    /// The image could not be fetched (network failure or non-success status).
    #[error("{0}")]
    Fetch(String),

    /// The fetched bytes are not a decodable image.
    #[error("{0}")]
    Decode(String),

    /// The captioning model failed or the engine is no longer running.
    #[error("{0}")]
    Inference(String),
}

impl CaptionError {
    /// Returns the HTTP status code reported for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CaptionError::Validation(_) => StatusCode::BAD_REQUEST,
            CaptionError::Fetch(_) | CaptionError::Decode(_) | CaptionError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CaptionError::Validation(_) => "validation",
            CaptionError::Fetch(_) => "fetch",
            CaptionError::Decode(_) => "decode",
            CaptionError::Inference(_) => "inference",
        }
    }
}

impl From<reqwest::Error> for CaptionError {
    fn from(err: reqwest::Error) -> Self {
        CaptionError::Fetch(error_chain(&err))
    }
}

/// Renders `err` followed by every cause in its source chain, skipping
/// causes whose text an outer message already includes.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

impl From<image::ImageError> for CaptionError {
    fn from(err: image::ImageError) -> Self {
        CaptionError::Decode(err.to_string())
    }
}

impl IntoResponse for CaptionError {
    fn into_response(self) -> Response {
        log::error!("Caption request failed ({}): {}", self.kind(), self);
        (
            self.status_code(),
            Json(CaptionResponse::failure(self.to_string())),
        )
            .into_response()
    }
}
