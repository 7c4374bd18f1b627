//! HTTP service that fetches an image by URL and returns a caption for it.
//!
//! The captioning model runs on its own thread inside a [`CaptionEngine`];
//! the axum front end in [`server`] validates requests, downloads and
//! decodes the image, and awaits the engine's answer.

mod engine;
mod error;
mod fetch;
pub mod messages;
mod model;
pub mod server;

pub use engine::{CaptionEngine, CaptionOutput, EngineState};
pub use error::CaptionError;
pub use fetch::{
    DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_USER_AGENT, ImageFetcher, decode_rgb8,
};
pub use model::{CaptionModel, DEFAULT_PROMPT, DEFAULT_SAMPLE_LEN, PaligemmaCaptioner, RgbImage};
pub use server::{AppState, ServerConfig, router, serve};
