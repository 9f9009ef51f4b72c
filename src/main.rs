use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use rssagg::api::{create_router, AppState};
use rssagg::config::Config;
use rssagg::feed::HttpFeedSource;
use rssagg::scraper::{FeedLedger, Scheduler};
use rssagg::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "rssagg", about = "RSS aggregator: REST API with a background feed scraper")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "rssagg.toml")]
    config: PathBuf,

    /// Port to listen on (overrides config and PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Serve the API without running the background scraper
    #[arg(long)]
    no_scraper: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal outside development
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    config
        .apply_env(|key| std::env::var(key).ok())
        .context("Invalid environment override")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate()?;

    let db = Database::open(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_path))?;

    let scraper = if args.no_scraper {
        tracing::info!("Background scraper disabled");
        None
    } else {
        let source = HttpFeedSource::build().context("Failed to build HTTP client")?;
        let ledger = FeedLedger::new(db.clone()).with_min_refresh_age(config.scraper.min_refresh_age());
        let scheduler = Scheduler::new(
            Arc::new(ledger),
            Arc::new(source),
            config.scraper.scraper_config(),
        );
        Some(scheduler.spawn())
    };

    let app = create_router(AppState::new(db));
    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(handle) = scraper {
        handle.abort();
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
