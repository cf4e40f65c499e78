use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "quake-cli")]
#[command(about = "Operator CLI for the earthquake API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    #[arg(short, long, env = "QUAKE_ADMIN_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show service status and circuit breaker details
    Status,
    /// Force the circuit breaker closed
    Reset,
    /// Check readiness (database connectivity)
    Ready,
    /// Run a live query
    Live {
        #[arg(long)]
        min_magnitude: Option<f64>,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = match cli.command {
        Commands::Status => {
            client
                .get(format!("{base}/admin/status"))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Reset => {
            client
                .post(format!("{base}/admin/circuit-breaker/reset"))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Ready => client.get(format!("{base}/ready")).send().await?,
        Commands::Live {
            min_magnitude,
            limit,
        } => {
            let mut query = vec![("limit", limit.to_string())];
            if let Some(m) = min_magnitude {
                query.push(("min_magnitude", m.to_string()));
            }
            client
                .get(format!("{base}/earthquakes/live"))
                .query(&query)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
