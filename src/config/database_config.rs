//! Database path configuration parsing from environment variables.

use std::env;

/// Paths to the two SQLite databases this crate owns: the main store (algos,
/// deployments, trades, candles, fetcher cursor) and the backtest store
/// (backtest requests and their simulated trades).
#[derive(Debug, Clone)]
pub struct DatabaseEnvConfig {
    pub main_db_path: String,
    pub backtest_db_path: String,
}

impl Default for DatabaseEnvConfig {
    fn default() -> Self {
        Self {
            main_db_path: "stardust.sqlite".to_string(),
            backtest_db_path: "stardust-backtest.sqlite".to_string(),
        }
    }
}

impl DatabaseEnvConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            main_db_path: env::var("DATABASE_MAIN_PATH").unwrap_or(defaults.main_db_path),
            backtest_db_path: env::var("DATABASE_BACKTEST_PATH").unwrap_or(defaults.backtest_db_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_distinct_sqlite_files() {
        let config = DatabaseEnvConfig::default();
        assert_ne!(config.main_db_path, config.backtest_db_path);
    }
}
