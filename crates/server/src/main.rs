//! Satchel server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use satchel_core::config::AppConfig;
use satchel_server::{create_router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Satchel - sync and object transfer server
#[derive(Parser, Debug)]
#[command(name = "satcheld")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "SATCHEL_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Satchel v{}", env!("CARGO_PKG_VERSION"));

    // Configuration comes from an optional TOML file plus SATCHEL_ env
    // overrides (double underscore separates sections, e.g.
    // SATCHEL_SERVER__BIND=0.0.0.0:8080).
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("SATCHEL_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    let warnings = config
        .server
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    for warning in warnings {
        tracing::warn!("{warning}");
    }

    let storage = satchel_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage backend")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend ready");

    let catalog = satchel_metadata::from_config(&config.catalog)
        .await
        .context("failed to initialize catalog store")?;

    let state = AppState::new(Arc::new(config), storage, catalog);

    let server_version = satchel_server::bootstrap::bootstrap(&state)
        .await
        .context("catalog bootstrap failed")?;
    tracing::info!(server_version, "Bootstrap complete");

    let addr: SocketAddr = state
        .config
        .server
        .bind
        .parse()
        .context("invalid bind address")?;
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}
