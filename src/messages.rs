use serde::{Deserialize, Serialize};

/// Body of `POST /caption`.
///
/// `image_url` is optional at the wire level so that a missing field can be
/// reported as a validation error instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CaptionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Body returned by `POST /caption`, either `{ok: true, caption}` or
/// `{ok: false, error}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CaptionResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaptionResponse {
    pub fn success(caption: impl Into<String>) -> Self {
        Self {
            ok: true,
            caption: Some(caption.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            caption: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}
