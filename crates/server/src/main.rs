//! Artstore control plane server binary.

use anyhow::{Context, Result};
use artstore_core::config::AppConfig;
use artstore_server::bootstrap::ensure_bootstrap_admins;
use artstore_server::{AppState, create_router};
use artstore_sync::{SyncEngine, SyncScheduler};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Artstore - registry reconciliation control plane
#[derive(Parser, Debug)]
#[command(name = "artstored")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "ARTSTORE_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

/// Load configuration from the optional TOML file and `ARTSTORE_` env vars.
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    // ARTSTORE_CONFIG is just the path, not configuration.
    let has_env_config = std::env::vars()
        .any(|(key, _)| key.starts_with("ARTSTORE_") && key != "ARTSTORE_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: artstored --config /path/to/config.toml\n  \
             2. Environment variables: ARTSTORE_SERVER__BIND=0.0.0.0:8080 \
             ARTSTORE_METADATA__TYPE=sqlite ARTSTORE_METADATA__PATH=/var/lib/artstore/artstore.db artstored\n\n\
             See config/server.example.toml for example configuration.\n\
             Set ARTSTORE_CONFIG env var to specify a default config file path."
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("ARTSTORE_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
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

    tracing::info!("Artstore v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    artstore_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let metadata = artstore_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata store health check failed")?;
    tracing::info!("Metadata store initialized");

    let created = ensure_bootstrap_admins(metadata.as_ref(), &config.auth).await?;
    if created > 0 {
        tracing::info!(count = created, "Bootstrap admin overrides created");
    }

    let nodes = artstore_upstream::storage_nodes_from_config(&config.storage_nodes)
        .context("failed to create storage node client")?;
    let identity = match &config.identity {
        Some(identity_config) => Some(
            artstore_upstream::identity_from_config(identity_config)
                .context("failed to create identity provider client")?,
        ),
        None => {
            tracing::warn!("No identity provider configured, service account sync is disabled");
            None
        }
    };

    let engine = Arc::new(SyncEngine::new(
        metadata.clone(),
        nodes,
        identity,
        config.sync.clone(),
    ));
    let scheduler = SyncScheduler::new(engine.clone(), config.sync.clone());
    scheduler.start();

    let state = AppState::new(config.clone(), metadata, engine, scheduler.status());
    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    scheduler.stop().await;
    served.context("server error")?;

    Ok(())
}
