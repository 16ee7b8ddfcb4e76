//! Exchange network configuration parsing from environment variables.

use anyhow::{Context, Result};
use std::env;

/// Which Stellar network horizon/signing endpoints to use.
#[derive(Debug, Clone)]
pub enum ExchangeNetwork {
    Public,
    Test,
    Custom { horizon_url: String, network_passphrase: String },
}

/// Exchange environment configuration: network selection, the trading
/// account, and the secret used to sign submitted transactions.
#[derive(Debug, Clone)]
pub struct ExchangeEnvConfig {
    pub network: ExchangeNetwork,
    pub account: String,
    pub signing_secret: String,
}

impl ExchangeEnvConfig {
    pub fn from_env() -> Result<Self> {
        let network = match env::var("EXCHANGE_NETWORK").unwrap_or_else(|_| "test".to_string()).to_lowercase().as_str() {
            "public" => ExchangeNetwork::Public,
            "test" => ExchangeNetwork::Test,
            "custom" => ExchangeNetwork::Custom {
                horizon_url: env::var("EXCHANGE_HORIZON_URL")
                    .context("EXCHANGE_HORIZON_URL is required when EXCHANGE_NETWORK=custom")?,
                network_passphrase: env::var("EXCHANGE_NETWORK_PASSPHRASE")
                    .context("EXCHANGE_NETWORK_PASSPHRASE is required when EXCHANGE_NETWORK=custom")?,
            },
            other => anyhow::bail!("invalid EXCHANGE_NETWORK: {other} (expected public, test, or custom)"),
        };

        Ok(Self {
            network,
            account: env::var("EXCHANGE_ACCOUNT").unwrap_or_default(),
            signing_secret: env::var("EXCHANGE_SIGNING_SECRET").unwrap_or_default(),
        })
    }
}
