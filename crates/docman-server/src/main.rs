//! Docman - document management backend

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, LogFormat};
use docman_api::{AppState, create_router, ensure_master, routes::metrics};
use docman_auth::{JwtManager, PasswordManager};
use docman_db::Database;
use docman_storage::LocalStorage;

/// Docman - document management backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "DOCMAN_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "DOCMAN_PORT")]
    port: Option<u16>,

    /// JWT signing secret
    #[arg(long, env = "DOCMAN_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(secret) = args.jwt_secret {
        config.auth.jwt_secret = Some(secret);
    }
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_logging(&config.logging.level, config.logging.format);
    config.validate()?;

    info!("Starting Docman v{}", env!("CARGO_PKG_VERSION"));

    // Create data directories
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::create_dir_all(&config.storage.path).await?;

    let db_url = format!("sqlite:{}?mode=rwc", config.database.path);
    let db = Database::new(&db_url)
        .await
        .context("Failed to open database")?;

    let storage = Arc::new(LocalStorage::new(&config.storage.path).await?);

    let secret = config.auth.jwt_secret.as_deref().unwrap_or_default();
    let jwt = Arc::new(JwtManager::new(
        secret,
        config.auth.access_ttl()?,
        config.auth.refresh_ttl()?,
    )?);
    let passwords = Arc::new(
        PasswordManager::new(config.auth.password.params())
            .context("Invalid argon2 parameters in [auth.password]")?,
    );

    let state = AppState::new(
        db,
        storage,
        jwt,
        passwords,
        config.storage.max_upload_bytes,
    );

    if ensure_master(&state, &config.bootstrap.account()).await? {
        info!(
            "Default master account created (name: {})",
            config.bootstrap.master_name
        );
    }

    let metrics_handle = if config.metrics.enabled {
        Some(Arc::new(
            metrics::install_recorder().context("Failed to install metrics recorder")?,
        ))
    } else {
        None
    };

    let app = create_router(state, metrics_handle)
        .layer(cors_layer(&config.server.cors_allowed_origins)?)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

/// CORS policy; no configured origins means any origin
fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {}", o))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
