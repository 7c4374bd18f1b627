use argh::FromArgs;
use caption_server::messages::CaptionRequest;

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 8000;

#[derive(FromArgs)]
/// Client for requesting captions from a running caption server
struct ClientArgs {
    /// the host to connect to
    #[argh(option, default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// command to execute: "caption" or "health"
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Caption(CaptionCommand),
    Health(HealthCommand),
}

#[derive(FromArgs)]
/// Caption the image found at a URL
#[argh(subcommand, name = "caption")]
struct CaptionCommand {
    /// the url of the image
    #[argh(positional)]
    image_url: String,
}

#[derive(FromArgs)]
/// Check that the server is alive
#[argh(subcommand, name = "health")]
struct HealthCommand {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: ClientArgs = argh::from_env();

    let client = reqwest::Client::new();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    let response = match args.command {
        ClientCommands::Caption(caption_command) => {
            client
                .post(format!("http://{}/caption", addr))
                .json(&CaptionRequest {
                    image_url: Some(caption_command.image_url),
                })
                .send()
                .await?
        }
        ClientCommands::Health(_) => client.get(format!("http://{}/health", addr)).send().await?,
    };

    let status = response.status();
    let result = response.json::<serde_json::Value>().await?;
    println!("Status: {}", status);
    println!("Result: {}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
