//! assocnet - Association and user management backend

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use assocnet_api::{AppState, create_router};
use assocnet_auth::AuthService;
use assocnet_db::Database;
use crate::config::{Config, LoggingConfig};

/// assocnet - Association and user management backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "ASSOCNET_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "ASSOCNET_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    init_logging(&config.logging);

    info!("Starting assocnet v{}", env!("CARGO_PKG_VERSION"));

    // Refuse to start without complete token settings
    let auth_settings = config.auth_settings()?;

    if let Some(parent) = Path::new(&config.database.path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", config.database.path);
    let db = Database::new(&db_url).await?;

    let auth = AuthService::new(&auth_settings, Arc::new(db.clone()), Arc::new(db.clone()))
        .context("Invalid auth configuration")?;
    info!("Refresh token rotation: {}", auth_settings.rotation);

    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(Arc::new(handle))
    } else {
        None
    };

    let state = AppState::new(db, Arc::new(auth));

    let mut app = create_router(state, metrics_handle).layer(TraceLayer::new_for_http());
    if config.server.cors_permissive {
        app = app.layer(CorsLayer::permissive());
    }

    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_addr, port))?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
