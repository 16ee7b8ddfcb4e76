//! Configuration module.
//!
//! Structured configuration loading from environment variables, organized by
//! concern: Exchange, Database, Engine, and Observability.

mod database_config;
mod engine_config;
mod exchange_config;
mod observability_config;

pub use database_config::DatabaseEnvConfig;
pub use engine_config::EngineEnvConfig;
pub use exchange_config::{ExchangeEnvConfig, ExchangeNetwork};
pub use observability_config::ObservabilityEnvConfig;

use anyhow::{Context, Result};

/// Top-level configuration, composed from the four env-driven sub-configs.
#[derive(Debug, Clone)]
pub struct Config {
    pub exchange: ExchangeEnvConfig,
    pub database: DatabaseEnvConfig,
    pub engine: EngineEnvConfig,
    pub observability: ObservabilityEnvConfig,
    pub http_bind_address: String,
    pub http_port: u16,
    pub auth_token: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            exchange: ExchangeEnvConfig::from_env().context("failed to load exchange config")?,
            database: DatabaseEnvConfig::from_env(),
            engine: EngineEnvConfig::from_env().context("failed to load engine config")?,
            observability: ObservabilityEnvConfig::from_env(),
            http_bind_address: std::env::var("HTTP_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(8080),
            auth_token: std::env::var("AUTH_TOKEN").unwrap_or_default(),
        })
    }
}

/// Serializes environment-variable mutation across the sub-config test
/// modules, which otherwise race when `cargo test` runs them concurrently.
#[cfg(test)]
pub(crate) fn env_lock() -> &'static std::sync::Mutex<()> {
    static LOCK: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
    LOCK.get_or_init(|| std::sync::Mutex::new(()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_succeeds_with_no_environment_set() {
        let _guard = env_lock().lock().unwrap();
        let config = Config::from_env().unwrap();
        assert_eq!(config.http_port, 8080);
    }
}
