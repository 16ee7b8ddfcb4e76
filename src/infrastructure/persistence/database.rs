//! SQLite connection + schema setup for the two databases this crate owns:
//! the main store (algos, deployments, trades, candles, fetcher cursor) and
//! the backtest store (backtest requests and their simulated trades).

use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    async fn connect(db_path: &str) -> Result<SqlitePool> {
        let path = Path::new(db_path);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .await
                .context("failed to create database directory")?;
        }

        let options = SqliteConnectOptions::from_str(db_path)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to connect to SQLite database")?;

        info!("connected to database: {db_path}");
        Ok(pool)
    }

    /// Opens (creating if needed) the main store and runs its schema.
    pub async fn main(db_path: &str) -> Result<Self> {
        let pool = Self::connect(db_path).await?;
        let db = Self { pool };
        db.init_main().await?;
        Ok(db)
    }

    /// Opens (creating if needed) the backtest store and runs its schema.
    pub async fn backtest(db_path: &str) -> Result<Self> {
        let pool = Self::connect(db_path).await?;
        let db = Self { pool };
        db.init_backtest().await?;
        Ok(db)
    }

    async fn init_main(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS algos (
                name TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                trade_pair TEXT NOT NULL,
                candlesize TEXT NOT NULL,
                strategy_name TEXT NOT NULL,
                parameters_json TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create algos table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS deployed_algos (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                algo_name TEXT NOT NULL,
                amount TEXT NOT NULL,
                num_cycles INTEGER NOT NULL,
                status TEXT NOT NULL,
                trade_pair TEXT NOT NULL,
                candlesize TEXT NOT NULL,
                strategy_name TEXT NOT NULL,
                parameters_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_deployed_algos_status ON deployed_algos (status);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create deployed_algos table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                ts TEXT NOT NULL,
                deployment_id TEXT NOT NULL,
                advice TEXT NOT NULL,
                sold_asset TEXT NOT NULL,
                sold_amount TEXT NOT NULL,
                bought_asset TEXT NOT NULL,
                bought_amount TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_deployment ON trades (deployment_id);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create trades table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sdex_ohlcv (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                trade_pair TEXT NOT NULL,
                ts TEXT NOT NULL,
                year INTEGER NOT NULL,
                month INTEGER NOT NULL,
                week INTEGER NOT NULL,
                day INTEGER NOT NULL,
                hour4 INTEGER NOT NULL,
                hour INTEGER NOT NULL,
                minute15 INTEGER NOT NULL,
                minute5 INTEGER NOT NULL,
                minute INTEGER NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                base_volume TEXT NOT NULL,
                counter_volume TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sdex_ohlcv_pair_ts ON sdex_ohlcv (trade_pair, ts);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create sdex_ohlcv table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create state table")?;

        info!("main database schema initialized");
        Ok(())
    }

    async fn init_backtest(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backtest_request (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                algo_name TEXT NOT NULL,
                start_ts TEXT NOT NULL,
                end_ts TEXT NOT NULL,
                trade_pair TEXT NOT NULL,
                candlesize TEXT NOT NULL,
                strategy_name TEXT NOT NULL,
                parameters_json TEXT NOT NULL,
                status TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_backtest_request_status ON backtest_request (status);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create backtest_request table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backtest_trades (
                ts TEXT NOT NULL,
                backtest_id TEXT NOT NULL,
                advice TEXT NOT NULL,
                sold_asset TEXT NOT NULL,
                sold_amount TEXT NOT NULL,
                bought_asset TEXT NOT NULL,
                bought_amount TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_backtest_trades_backtest ON backtest_trades (backtest_id);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create backtest_trades table")?;

        info!("backtest database schema initialized");
        Ok(())
    }
}
