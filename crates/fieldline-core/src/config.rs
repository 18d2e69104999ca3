use config::Config;
use serde::Deserialize;

use crate::constants::{DEFAULT_IDEMPOTENCY_TTL_SECS, DEFAULT_SWEEP_INTERVAL_SECS};
use crate::error::CoreResult;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub idempotency: IdempotencyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Which store backs the generic idempotency cache.
///
/// `Memory` is per-instance only: the at-most-once guarantee does not hold
/// across multiple server processes. `Postgres` shares records through the
/// durable store so replays are recognized instance-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyBackendKind {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdempotencyConfig {
    pub backend: IdempotencyBackendKind,
    pub ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
}

impl IdempotencyConfig {
    #[must_use]
    pub const fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ttl_seconds)
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl Settings {
    /// ## Summary
    /// Loads configuration from `.env` file and environment variables into a `Settings`.
    /// Environment variables take precedence over `.env` file values.
    ///
    /// ## Errors
    /// Returns an error if building the configuration or deserializing it fails.
    pub fn load() -> CoreResult<Self> {
        Ok(Config::builder()
            .set_default("database.max_connections", 4)?
            .set_default("logging.level", "debug")?
            .set_default("idempotency.backend", "memory")?
            .set_default("idempotency.ttl_seconds", DEFAULT_IDEMPOTENCY_TTL_SECS)?
            .set_default(
                "idempotency.sweep_interval_seconds",
                DEFAULT_SWEEP_INTERVAL_SECS,
            )?
            // Env file
            .add_source(
                config::Environment::default()
                    .convert_case(config::Case::Snake)
                    .separator("_")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            // TOML file
            .add_source(config::File::with_name("config.toml").required(false))
            .build()?
            .try_deserialize::<Settings>()?)
    }
}

/// ## Summary
/// Loads configuration from environment variables and `.env` file.
///
/// ## Errors
/// Returns an error if loading or deserializing the configuration fails.
pub fn load_config() -> CoreResult<Settings> {
    dotenvy::dotenv().ok();

    Settings::load()
}
