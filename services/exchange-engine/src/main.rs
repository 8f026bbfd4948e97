mod config;
mod error;
mod handlers;
mod models;
mod router;
mod state;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use matching_engine::ProcessorManager;
use router::create_router;
use state::AppState;
use store::{keys, RedisStore, Store};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use types::ids::Symbol;

use config::{Cli, Config};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(env = %config.env, "starting exchange engine");

    match run(config).await {
        Ok(()) => {
            info!("exchange engine stopped cleanly");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "exchange engine failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = Arc::new(
        RedisStore::connect(&config.redis_url, config.redis_pool_size).await?,
    );

    // Seed the symbol registry; processors start only for members.
    let mut registry = Vec::new();
    for tag in &config.trading_pairs {
        match Symbol::try_new(tag) {
            Some(symbol) => {
                store.set_add(keys::TRADING_PAIRS, symbol.as_str()).await?;
                registry.push(symbol);
            }
            None => anyhow::bail!("invalid trading pair in configuration: {tag:?}"),
        }
    }
    if registry.is_empty() {
        anyhow::bail!("no trading pairs configured");
    }

    let mut manager = ProcessorManager::new(Arc::clone(&store));
    manager.start().await?;

    let app = create_router(AppState::new(Arc::clone(&store), registry));
    let listener = TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain the processors before exiting.
    manager.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        error!("failed to install shutdown signal handler");
        // Fall through: returning stops the server rather than leaving it unstoppable.
    }
    info!("shutdown signal received, draining");
}
