//! Licensor license server
//!
//! Serves the admin and activation API over HTTP, backed by a single JSON
//! store file:
//! 1. Admins issue, inspect and adjust licenses with a bearer token
//! 2. Client installations activate, validate and meter with their key
//!
//! Usage:
//!   LICENSOR_ADMIN_TOKEN=... licensor-server --port 8787 --data licenses.json

use std::{net::IpAddr, net::SocketAddr, path::PathBuf};
use anyhow::{Context, Result, bail};
use clap::Parser;
use licensor_license::LicenseManager;
use licensor_server::{AppState, DEFAULT_RETRY_ATTEMPTS, build_router};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "licensor-server")]
#[command(about = "Licensor license and seat activation server")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "8787")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Path to the license store file
    #[arg(short, long, default_value = "licenses.json")]
    data: PathBuf,

    /// Bearer token required on admin routes
    #[arg(long, env = "LICENSOR_ADMIN_TOKEN", hide_env_values = true)]
    admin_token: String,

    /// Attempts for a request that hits a persistence failure (1-5)
    #[arg(long, default_value_t = DEFAULT_RETRY_ATTEMPTS)]
    retry_attempts: u32,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let admin_token = args.admin_token.trim();
    if admin_token.is_empty() {
        bail!("admin token must not be empty");
    }

    info!("Licensor server starting...");
    let manager = LicenseManager::open(&args.data)
        .with_context(|| format!("Failed to open license store at {}", args.data.display()))?;
    let listing = manager.list();
    info!(
        "Loaded {} licenses and {} activations from {:?}",
        listing.licenses.len(),
        listing.activations.len(),
        args.data
    );

    let state = AppState::new(manager, admin_token).with_retry_attempts(args.retry_attempts);
    let app = build_router(state);

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local = listener.local_addr().context("Failed to read bound address")?;

    println!("\n========================================");
    println!("  Licensor Server Running");
    println!("========================================");
    println!("  Listening: http://{}", local);
    println!("  Store:     {}", args.data.display());
    println!("========================================\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Licensor server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
