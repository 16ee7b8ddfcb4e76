//! Engine runtime configuration parsing from environment variables: poll and
//! reap cadences, and the bounded channel capacities wiring the Fetcher,
//! Fan-out, Engine Controller and Trader together.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineEnvConfig {
    pub fetcher_poll_interval: Duration,
    pub trader_reap_interval: Duration,
    pub candle_channel_capacity: usize,
    pub advice_channel_capacity: usize,
    pub engine_command_channel_capacity: usize,
}

impl Default for EngineEnvConfig {
    fn default() -> Self {
        Self {
            fetcher_poll_interval: Duration::from_secs(5),
            trader_reap_interval: Duration::from_secs(1),
            candle_channel_capacity: 64,
            advice_channel_capacity: 64,
            engine_command_channel_capacity: 32,
        }
    }
}

impl EngineEnvConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let fetcher_poll_interval = Self::parse_secs("ENGINE_FETCHER_POLL_INTERVAL_SECS", defaults.fetcher_poll_interval)?;
        let trader_reap_interval = Self::parse_secs("ENGINE_TRADER_REAP_INTERVAL_SECS", defaults.trader_reap_interval)?;

        Ok(Self {
            fetcher_poll_interval,
            trader_reap_interval,
            candle_channel_capacity: Self::parse_usize("ENGINE_CANDLE_CHANNEL_CAPACITY", defaults.candle_channel_capacity)?,
            advice_channel_capacity: Self::parse_usize("ENGINE_ADVICE_CHANNEL_CAPACITY", defaults.advice_channel_capacity)?,
            engine_command_channel_capacity: Self::parse_usize(
                "ENGINE_COMMAND_CHANNEL_CAPACITY",
                defaults.engine_command_channel_capacity,
            )?,
        })
    }

    fn parse_secs(key: &str, default: Duration) -> Result<Duration> {
        match env::var(key) {
            Ok(v) => Ok(Duration::from_secs(v.parse::<u64>().with_context(|| format!("failed to parse {key}"))?)),
            Err(_) => Ok(default),
        }
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        match env::var(key) {
            Ok(v) => v.parse::<usize>().with_context(|| format!("failed to parse {key}")),
            Err(_) => Ok(default),
        }
    }
}
