//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use morbles_store::WriteMode;

/// Upper bound for `SESSION_TTL_SECS`: one year.
pub const MAX_SESSION_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// Platform data directory (`Database::new`).
    Default,
    /// Explicit file path.
    Path(PathBuf),
    /// Private in-memory database, lost on exit.
    Memory,
}

impl DatabaseLocation {
    /// Parse a `DATABASE_URL` value: a plain path, `sqlite://path`,
    /// `sqlite:path` or `:memory:`.
    pub fn parse(url: &str) -> Self {
        let url = url.trim();
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);

        match path {
            "" => DatabaseLocation::Default,
            ":memory:" => DatabaseLocation::Memory,
            other => DatabaseLocation::Path(PathBuf::from(other)),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`, or `PORT` to keep the default host.
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Storage connection string.
    /// Env: `DATABASE_URL`
    /// Default: platform data directory.
    pub database: DatabaseLocation,

    /// Domain attribute for the session cookie.
    /// Env: `CLIENT_DOMAIN`
    /// Default: unset (host-only cookie).
    pub client_domain: Option<String>,

    /// Origins allowed to call the API with credentials.
    /// Env: `CORS_ORIGINS` (comma separated)
    /// Default: `http://localhost:4200`
    pub cors_origins: Vec<String>,

    /// Admin API bearer token. Required to access /admin/* endpoints.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin API disabled).
    pub admin_token: Option<String>,

    /// Whether unknown names may register on first login.
    /// Env: `REGISTRATION_OPEN` (true/false)
    /// Default: `true`
    pub registration_open: bool,

    /// Write a progress submission in one transaction.
    /// Env: `PROGRESS_WRITES_ATOMIC` (true/false)
    /// Default: `false` (each level entry written independently)
    pub write_mode: WriteMode,

    /// Session lifetime in seconds, at most [`MAX_SESSION_TTL_SECS`].
    /// Env: `SESSION_TTL_SECS`
    /// Default: one week.
    pub session_ttl_secs: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database: DatabaseLocation::Default,
            client_domain: None,
            cors_origins: vec!["http://localhost:4200".to_string()],
            admin_token: None,
            registration_open: true,
            write_mode: WriteMode::PerEntry,
            session_ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.http_addr.set_port(port),
                Err(_) => tracing::warn!(value = %port, "Invalid PORT, using default"),
            }
        }

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(url) = lookup("DATABASE_URL") {
            config.database = DatabaseLocation::parse(&url);
        }

        if let Some(domain) = lookup("CLIENT_DOMAIN") {
            if !domain.trim().is_empty() {
                config.client_domain = Some(domain.trim().to_string());
            }
        }

        if let Some(origins) = lookup("CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(token) = lookup("ADMIN_TOKEN") {
            if !token.is_empty() {
                config.admin_token = Some(token);
            }
        }

        if let Some(val) = lookup("REGISTRATION_OPEN") {
            config.registration_open = val != "false" && val != "0";
        }

        if let Some(val) = lookup("PROGRESS_WRITES_ATOMIC") {
            if val == "true" || val == "1" {
                config.write_mode = WriteMode::Atomic;
            }
        }

        if let Some(val) = lookup("SESSION_TTL_SECS") {
            match val.parse::<i64>() {
                Ok(n) if n > 0 && n <= MAX_SESSION_TTL_SECS => config.session_ttl_secs = n,
                _ => tracing::warn!(value = %val, "Invalid SESSION_TTL_SECS, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
