use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fieldsense::api::AppState;
use fieldsense::config::FieldSenseConfig;
use fieldsense::{telemetry, web};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "fieldsense")]
#[command(about = "Farm advisory and local conditions service", version)]
struct CliArgs {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Local overrides first; dotenvy never replaces variables that are already set
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();

    let mut config = FieldSenseConfig::load_from_path(args.config)?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let _telemetry = telemetry::init(&config.logging, args.verbose)?;
    info!(version = fieldsense::VERSION, "Starting FieldSense");

    let state = AppState::from_config(&config).context("Failed to initialize services")?;
    web::run(&config.server, Arc::new(state)).await?;

    info!("FieldSense stopped");
    Ok(())
}
