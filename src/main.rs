//! mock-proxy
//!
//! A local development HTTP proxy.
//!
//! ```text
//!                          ┌───────────────────────────────────────────────┐
//!                          │                  MOCK PROXY                   │
//!                          │                                               │
//!     Client Request       │  ┌─────────┐    ┌────────────┐               │
//!     ─────────────────────┼─▶│  http   │───▶│ dispatcher │               │
//!                          │  │ server  │    └─────┬──────┘               │
//!                          │  └─────────┘          │                      │
//!                          │        ┌──────────────┼───────────────┐      │
//!                          │        ▼              ▼               ▼      │
//!                          │  /__reload_rules   rule match     no match   │
//!                          │  (rule store)     (local file)   (connector) │
//!                          │                                        │     │
//!     Client Response      │  ┌─────────┐                    ┌──────▼───┐ │
//!     ◀────────────────────┼──│  relay  │◀───────────────────│ upstream │◀┼──── Upstream
//!                          │  │  body   │                    │   conn   │ │     Server
//!                          │  └─────────┘                    └──────────┘ │
//!                          └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use mock_proxy::config::loader::{load_config, ConfigError};
use mock_proxy::config::validation::validate_config;
use mock_proxy::lifecycle::{signals, startup, Shutdown};
use mock_proxy::observability::logging;
use mock_proxy::{HttpServer, ProxyConfig};

#[derive(Parser)]
#[command(name = "mock-proxy")]
#[command(about = "Local HTTP proxy serving file-backed mocks", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mocks directory (overrides the config file).
    #[arg(short, long)]
    mocks: Option<String>,

    /// Listen address (overrides the config file).
    #[arg(short, long)]
    bind: Option<String>,

    /// Reload rules when the mocks directory changes.
    #[arg(short, long)]
    watch: bool,
}

fn build_config(args: &Args) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(mocks) = &args.mocks {
        config.mocks.dir = mocks.clone();
    }
    if let Some(bind) = &args.bind {
        config.listener.bind_address = bind.clone();
    }
    if args.watch {
        config.mocks.watch = true;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = build_config(&args)?;

    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        mocks = %config.mocks.dir,
        watch = config.mocks.watch,
        connect_timeout_secs = config.timeouts.connect_secs,
        "mock-proxy starting"
    );

    startup::init_metrics(&config);

    let listener = startup::bind_listener(&config).await?;

    let server = HttpServer::new(config);
    let shutdown = Shutdown::new();
    tokio::spawn(signals::listen(server.rules(), shutdown.clone()));

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
