use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use mock_proxy::routing::load_rules;
use mock_proxy::RELOAD_PATH;

#[derive(Parser)]
#[command(name = "mock-proxy-cli")]
#[command(about = "Management CLI for the mock proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a running proxy to reload its rules
    Reload,
    /// Print the rule table built from a mocks directory
    Rules {
        #[arg(short, long, default_value = "mocks")]
        mocks: PathBuf,
    },
    /// Show which rule a request path would hit
    Resolve {
        path: String,
        #[arg(short, long, default_value = "mocks")]
        mocks: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Reload => {
            let client = reqwest::Client::new();
            let res = client
                .get(format!("{}{}", cli.url.trim_end_matches('/'), RELOAD_PATH))
                .send()
                .await?;
            let status = res.status();
            if status.is_success() {
                println!("Rules reloaded ({})", status);
            } else {
                eprintln!("Error: reload returned status {}", status);
                if let Ok(text) = res.text().await {
                    eprintln!("Response: {}", text);
                }
                std::process::exit(1);
            }
        }
        Commands::Rules { mocks } => {
            let table = load_rules(&mocks)?;
            let rules: Vec<Value> = table
                .iter()
                .map(|rule| json!({ "pattern": rule.pattern.as_str(), "target": rule.target }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }
        Commands::Resolve { path, mocks } => {
            let resolution = if path == RELOAD_PATH {
                json!({ "path": path, "route": "control" })
            } else {
                let table = load_rules(&mocks)?;
                match table.match_path(&path) {
                    Some(rule) => json!({
                        "path": path,
                        "route": "local",
                        "pattern": rule.pattern.as_str(),
                        "file": rule.target.resolve(),
                    }),
                    None => json!({ "path": path, "route": "forwarding" }),
                }
            };
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        }
    }

    Ok(())
}
