use crate::{
    engine::CaptionEngine,
    error::CaptionError,
    fetch::{
        DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_USER_AGENT, ImageFetcher,
        decode_rgb8,
    },
    messages::{CaptionRequest, CaptionResponse, HealthResponse},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::Method,
    routing::{get, post},
};
use reqwest::Url;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

// defaults for the server
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;

/// Largest `POST /caption` body accepted; a request only carries a URL.
pub const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Settings for the HTTP front end and its outbound image requests.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub fetch_timeout: Duration,
    pub user_agent: String,
    pub max_image_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the fetcher used for outbound image requests.
    pub fn image_fetcher(&self) -> Result<ImageFetcher, reqwest::Error> {
        Ok(ImageFetcher::new(self.fetch_timeout, &self.user_agent)?
            .with_max_bytes(self.max_image_bytes))
    }
}

/// Shared, read-only state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<CaptionEngine>,
    fetcher: ImageFetcher,
}

impl AppState {
    pub fn new(engine: Arc<CaptionEngine>, fetcher: ImageFetcher) -> Self {
        Self { engine, fetcher }
    }
}

/// Builds the router exposing `POST /caption`, `GET /health` and `GET /`.
pub fn router(state: AppState) -> Router {
    // the service is called straight from browser extensions
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "Welcome to caption-server!" }))
        .route("/health", get(get_health))
        .route("/caption", post(post_caption))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Serves `state` on `listener` until `shutdown` resolves, then lets the
/// in-flight requests finish.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

async fn post_caption(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<CaptionResponse>, CaptionError> {
    let body = body.map_err(|rejection| {
        CaptionError::Validation(format!("invalid request body: {}", rejection.body_text()))
    })?;

    // anything that is not an object with a string `image_url` counts as missing
    let request: CaptionRequest = serde_json::from_slice(&body).unwrap_or_default();
    let url = parse_image_url(&request)?;

    log::info!("Caption requested for {url}");
    log::debug!("Engine is {}", state.engine.state().as_str());

    let bytes = state.fetcher.fetch(url).await?;

    let image = tokio::task::spawn_blocking(move || decode_rgb8(&bytes))
        .await
        .map_err(|e| CaptionError::Decode(e.to_string()))??;

    let output = state.engine.caption(image).await?;

    log::info!(
        "Generated caption {}: {:?} in {:?}",
        output.id,
        output.caption,
        output.duration
    );

    Ok(Json(CaptionResponse::success(output.caption)))
}

fn parse_image_url(request: &CaptionRequest) -> Result<Url, CaptionError> {
    let raw = request
        .image_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| CaptionError::Validation("missing image_url".to_string()))?;

    let url =
        Url::parse(raw).map_err(|e| CaptionError::Validation(format!("invalid image_url: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(CaptionError::Validation(format!(
            "invalid image_url: unsupported scheme '{scheme}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: Option<&str>) -> CaptionRequest {
        CaptionRequest {
            image_url: url.map(str::to_string),
        }
    }

    #[test]
    fn missing_and_blank_urls_are_missing() {
        for req in [request(None), request(Some("")), request(Some("   "))] {
            let err = parse_image_url(&req).unwrap_err();
            assert_eq!(err.to_string(), "missing image_url");
        }
    }

    #[test]
    fn malformed_url_is_invalid() {
        let err = parse_image_url(&request(Some("not a url"))).unwrap_err();
        assert!(matches!(err, CaptionError::Validation(_)));
        assert!(err.to_string().starts_with("invalid image_url"));
    }

    #[test]
    fn only_http_schemes_are_accepted() {
        let err = parse_image_url(&request(Some("file:///etc/passwd"))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid image_url: unsupported scheme 'file'"
        );

        let url = parse_image_url(&request(Some(" https://example.com/cat.png "))).unwrap();
        assert_eq!(url.as_str(), "https://example.com/cat.png");
    }

    #[test]
    fn default_config_listens_on_loopback() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:8000");
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.max_image_bytes, DEFAULT_MAX_IMAGE_BYTES);
        assert!(config.image_fetcher().is_ok());
    }
}
