//! PDF Merge Web - HTTP service that merges uploaded PDFs into one download.

mod error;
mod routes;
mod state;
mod templates;

use anyhow::{Context, Result};
use clap::Parser;
use pdf_merge_core::AppConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "pdf-merge-web")]
#[command(author, version, about = "PDF Merge Web Server", long_about = None)]
struct Args {
    /// Host to bind to (overrides config)
    #[arg(long, env = "PDF_MERGE_HOST")]
    host: Option<String>,

    /// Port to bind to (overrides config)
    #[arg(short, long, env = "PDF_MERGE_PORT")]
    port: Option<u16>,

    /// Configuration file (defaults to ~/.config/pdf-merge/config.toml or ./config.toml)
    #[arg(short, long, env = "PDF_MERGE_CONFIG")]
    config: Option<PathBuf>,

    /// Include internal error text in 500 responses
    #[arg(long)]
    expose_error_detail: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},lopdf=warn")));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_sources(Some(path.as_path()))
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load(),
    };

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.expose_error_detail {
        config.server.expose_error_detail = true;
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid bind address")?;

    info!(
        "Limits: {} files, {} bytes total, field '{}'",
        config.limits.max_files, config.limits.max_total_bytes, config.limits.field_name
    );

    let app = routes::router(Arc::new(AppState::new(config)));

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
