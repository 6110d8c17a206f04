//! Cardfeed Server - Headless Daemon
//!
//! Discovers the configured card sources, keeps their cards cached and in sync,
//! and serves:
//! - A read API over the cache on /api/*
//! - A webhook remote sources post change notifications to (/api/notifications)
//! - A server-sent event stream of card changes (/api/events)
//!
//! Access via: http://localhost:8046

use anyhow::Result;
use axum::{routing::get, Router};
use clap::Parser;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod api;
mod cli;
mod server_utils;
mod state;

use cardfeed_core::{config, CardFeedManager, HttpSourceProvider, NotificationHub};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let feed_config = config::load_or_default(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    match cli.command.as_ref().unwrap_or(&Commands::Serve) {
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&feed_config)?);
            Ok(())
        },
        Commands::InitConfig => {
            let path = cli
                .config
                .clone()
                .or_else(config::default_config_path)
                .ok_or_else(|| anyhow::anyhow!("No config path available on this platform"))?;
            config::save_config(&path, &feed_config)?;
            info!("📝 Wrote config to {}", path.display());
            Ok(())
        },
        Commands::Serve => serve(&cli, feed_config).await,
    }
}

async fn serve(cli: &Cli, feed_config: cardfeed_types::FeedConfig) -> Result<()> {
    info!("🚀 Cardfeed Server starting on port {}...", cli.port);
    info!("📋 {} remote source(s) configured", feed_config.sources.len());

    let hub = NotificationHub::new();
    let provider = HttpSourceProvider::new(&feed_config, hub.clone())?;
    let manager = Arc::new(CardFeedManager::new(Arc::new(provider), feed_config));
    let state = AppState::new(Arc::clone(&manager), hub);

    manager.initialize().await?;
    info!("✅ Card feed initialized, loading sources in the background");

    let listener = server_utils::create_listener(&cli.bind, cli.port).await?;

    info!("🔌 API available at http://{}:{}/api/", cli.bind, cli.port);

    serve_until(listener, state, server_utils::shutdown_signal()).await?;

    manager.teardown().await;
    info!("👋 Cardfeed Server stopped");
    Ok(())
}

/// Serve until `signal` fires, then close event streams and drain connections.
async fn serve_until<F>(listener: TcpListener, state: AppState, signal: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            state.begin_shutdown();
        })
        .await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api::router())
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

async fn health_check() -> &'static str {
    "ok"
}
