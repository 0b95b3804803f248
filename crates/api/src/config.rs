//! Environment-driven configuration for the API and worker binaries.

use anyhow::{Context, bail};

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds (`BIND_ADDR`, default `0.0.0.0:8080`).
    pub bind_addr: String,
    /// Persistent-store mode (`USE_PERSISTENT_STORES`, default false).
    ///
    /// In-memory mode runs the job executor inside the API process; in
    /// persistent mode jobs go to Redis and a separate `dealbrief-worker`
    /// process executes them against Postgres.
    pub use_persistent: bool,
    /// Postgres connection string (`DATABASE_URL`, required when persistent).
    pub database_url: Option<String>,
    /// Redis connection string (`REDIS_URL`, required when persistent).
    pub redis_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let use_persistent = std::env::var("USE_PERSISTENT_STORES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let database_url = std::env::var("DATABASE_URL").ok();
        let redis_url = std::env::var("REDIS_URL").ok();

        if use_persistent {
            if database_url.is_none() {
                bail!("USE_PERSISTENT_STORES=true requires DATABASE_URL");
            }
            if redis_url.is_none() {
                bail!("USE_PERSISTENT_STORES=true requires REDIS_URL");
            }
        }

        Ok(Self {
            bind_addr,
            use_persistent,
            database_url,
            redis_url,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL is not set")
    }

    pub fn redis_url(&self) -> anyhow::Result<&str> {
        self.redis_url.as_deref().context("REDIS_URL is not set")
    }
}
