use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the relay gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:5174")]
    url: String,

    #[arg(short, long, env = "GATEWAY_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Version, uptime and upstream configuration
    Status,
    /// Live relay sessions and configured routes
    Sessions,
    /// Unauthenticated liveness probe
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", cli.key))?);

    let request = match cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")).headers(headers),
        Commands::Sessions => client.get(format!("{base}/admin/sessions")).headers(headers),
        Commands::Health => client.get(format!("{base}/health")),
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
