use argh::FromArgs;
use caption_server::{
    AppState, CaptionEngine, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_PROMPT,
    DEFAULT_SAMPLE_LEN, DEFAULT_USER_AGENT, PaligemmaCaptioner, ServerConfig,
    server::{DEFAULT_HOST, DEFAULT_PORT},
};
use std::{sync::Arc, time::Duration};

#[derive(FromArgs)]
/// Serve image captions over HTTP.
struct ServerArgs {
    /// the host to run the server on
    #[argh(option, default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// the prompt given to the captioning model
    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    prompt: String,

    /// the maximum number of tokens to generate per caption
    #[argh(option, default = "DEFAULT_SAMPLE_LEN")]
    sample_len: usize,

    /// timeout for fetching an image, in seconds
    #[argh(option, default = "DEFAULT_FETCH_TIMEOUT.as_secs()")]
    fetch_timeout: u64,

    /// the largest image, in bytes, the server will download
    #[argh(option, default = "DEFAULT_MAX_IMAGE_BYTES")]
    max_image_bytes: usize,

    /// user agent sent when fetching images
    #[argh(option, default = "DEFAULT_USER_AGENT.to_string()")]
    user_agent: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: ServerArgs = argh::from_env();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        fetch_timeout: Duration::from_secs(args.fetch_timeout),
        user_agent: args.user_agent,
        max_image_bytes: args.max_image_bytes,
    };

    log::info!("📦 Loading the captioning model");
    let model = PaligemmaCaptioner::new(args.prompt, args.sample_len)?;
    let engine = Arc::new(CaptionEngine::new(model));
    let fetcher = config.image_fetcher()?;

    let addr = config.addr();
    log::info!("🚀 Starting the server");
    log::info!("🔥 Listening on: {}", addr);
    log::info!("🔧 Press Ctrl+C to stop the server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    caption_server::serve(listener, AppState::new(engine.clone(), fetcher), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
        }
    })
    .await?;

    log::info!("🛑 Stopping the inference engine");
    drop(engine);

    Ok(())
}
