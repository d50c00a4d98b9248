//! # morbles-server
//!
//! HTTP backend for the Morbles puzzle game.
//!
//! This binary provides:
//! - the **level catalog**, held in memory and written through to SQLite
//! - the **player directory** with per-player credentials and cookie sessions
//! - **progress tracking**: stored level statuses reconciled against the
//!   catalog on every read
//! - a small **admin API** guarded by a bearer token

mod api;
mod catalog;
mod config;
mod directory;
mod error;
mod session;
mod throttle;

use anyhow::Context;
use morbles_store::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::{DatabaseLocation, ServerConfig};

fn open_database(location: &DatabaseLocation) -> anyhow::Result<Database> {
    let db = match location {
        DatabaseLocation::Default => Database::new(),
        DatabaseLocation::Path(path) => Database::open_at(path),
        DatabaseLocation::Memory => Database::open_in_memory(),
    }
    .with_context(|| format!("failed to open database ({location:?})"))?;
    Ok(db)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,morbles_server=debug")),
        )
        .init();

    info!("Starting Morbles server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        http_addr = %config.http_addr,
        database = ?config.database,
        registration_open = config.registration_open,
        write_mode = ?config.write_mode,
        admin_enabled = config.admin_token.is_some(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Open storage and load the catalog
    // -----------------------------------------------------------------------
    let db = open_database(&config.database)?;
    if let Some(path) = db.path() {
        info!(path = %path.display(), "Database opened");
    }

    let http_addr = config.http_addr;
    let app_state = AppState::new(db, config)
        .await
        .context("failed to load level catalog")?;

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Expired sessions, every 10 minutes
    let sessions = app_state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(600));
        loop {
            interval.tick().await;
            sessions.purge_expired().await;
        }
    });

    // Login throttle buckets idle for more than 10 minutes, every 5 minutes
    let throttle = app_state.login_throttle.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            throttle.purge_stale(600.0).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server until it fails or Ctrl+C arrives
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
