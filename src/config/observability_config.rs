//! Observability configuration parsing from environment variables.
//!
//! This module handles loading logging and metrics configuration.

use std::env;

/// Observability environment configuration
#[derive(Debug, Clone)]
pub struct ObservabilityEnvConfig {
    pub log_level: String,
    pub metrics_enabled: bool,
}

impl Default for ObservabilityEnvConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}

impl ObservabilityEnvConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            metrics_enabled: env::var("METRICS_ENABLED")
                .ok()
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(defaults.metrics_enabled),
        }
    }
}
