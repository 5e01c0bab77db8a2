use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "failover-cli")]
#[command(about = "Operator CLI for the failover controller", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show active target, counters and configuration
    Status,
    /// Show time-to-recover and error rate around the last injected failure
    Metrics,
    /// Show the most recent forwarding attempts
    Logs {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Make the primary fail (error, timeout or crash)
    Inject {
        #[arg(short, long, default_value = "timeout")]
        mode: String,
    },
    /// Send traffic back to the primary and clear failure counters
    Reset,
    /// Recover the primary, then reset the controller
    Recover,
    /// Clear the request log and the current measurement
    ClearLogs,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/status", base)).send().await?,
        Commands::Metrics => client.get(format!("{}/metrics", base)).send().await?,
        Commands::Logs { limit } => {
            client
                .get(format!("{}/logs", base))
                .query(&[("limit", limit)])
                .send()
                .await?
        }
        Commands::Inject { mode } => {
            client
                .post(format!("{}/inject-failure", base))
                .json(&json!({ "mode": mode }))
                .send()
                .await?
        }
        Commands::Reset => client.post(format!("{}/reset", base)).send().await?,
        Commands::Recover => client.post(format!("{}/recover-primary", base)).send().await?,
        Commands::ClearLogs => client.delete(format!("{}/logs", base)).send().await?,
    };
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: controller returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
