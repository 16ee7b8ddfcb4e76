//! SQLite implementations of every `domain::repositories` trait.
//!
//! # Current Implementation
//!
//! A single SQLite-backed implementation of each trait, built on `sqlx`,
//! split across the main database (algos, deployments, trades, candles,
//! fetcher cursor) and the backtest database (backtest requests and their
//! simulated trades).
//!
//! # Future
//!
//! Nothing here is SQLite-specific; a Postgres implementation could be
//! dropped in behind the same traits without touching application code.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::errors::PersistenceError;
use crate::domain::market::asset::TradingPair;
use crate::domain::market::candle::Candle;
use crate::domain::market::resolution::{self, Resolution};
use crate::domain::repositories::{
    AlgoRepository, BacktestRequestRepository, CandleRepository, DeploymentRepository,
    StateRepository, TradeRecordRepository,
};
use crate::domain::trading::{
    Advice, Algo, BacktestRequest, BacktestStatus, Deployment, DeploymentStatus, TradeOwner,
    TradeRecord,
};

fn query_failed(context: &str, e: sqlx::Error) -> PersistenceError {
    PersistenceError::QueryFailed(format!("{context}: {e}"))
}

fn parse_advice(s: &str) -> Advice {
    match s {
        "sell" => Advice::Sell,
        _ => Advice::Buy,
    }
}

fn parse_deployment_status(s: &str) -> DeploymentStatus {
    match s {
        "running" => DeploymentStatus::Running,
        "finished" => DeploymentStatus::Finished,
        "stopped" => DeploymentStatus::Stopped,
        "error" => DeploymentStatus::Error,
        _ => DeploymentStatus::New,
    }
}

fn parse_backtest_status(s: &str) -> BacktestStatus {
    match s {
        "running" => BacktestStatus::Running,
        "error" => BacktestStatus::Error,
        "finished" => BacktestStatus::Finished,
        _ => BacktestStatus::New,
    }
}

fn decimal_of(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Decimal, PersistenceError> {
    let raw: String = row.try_get(column).map_err(|e| query_failed(column, e))?;
    Decimal::from_str(&raw).map_err(|e| PersistenceError::QueryFailed(format!("malformed decimal in {column}: {e}")))
}

fn algo_of_row(row: &sqlx::sqlite::SqliteRow) -> Result<Algo, PersistenceError> {
    let pair_key: String = row.try_get("trade_pair").map_err(|e| query_failed("trade_pair", e))?;
    let pair = TradingPair::from_key(&pair_key)
        .ok_or_else(|| PersistenceError::QueryFailed(format!("malformed trade_pair: {pair_key}")))?;
    let candlesize: String = row.try_get("candlesize").map_err(|e| query_failed("candlesize", e))?;
    let resolution = Resolution::from_str(&candlesize)
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
    let parameters_json: String = row.try_get("parameters_json").map_err(|e| query_failed("parameters_json", e))?;
    let strategy_parameters = serde_json::from_str(&parameters_json)
        .map_err(|e| PersistenceError::QueryFailed(format!("malformed parameters_json: {e}")))?;

    Ok(Algo {
        name: row.try_get("name").map_err(|e| query_failed("name", e))?,
        owner: row.try_get("owner").map_err(|e| query_failed("owner", e))?,
        pair,
        resolution,
        strategy_name: row.try_get("strategy_name").map_err(|e| query_failed("strategy_name", e))?,
        strategy_parameters,
    })
}

pub struct SqliteAlgoRepository {
    pool: SqlitePool,
}

impl SqliteAlgoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlgoRepository for SqliteAlgoRepository {
    async fn save(&self, algo: &Algo) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO algos (name, owner, trade_pair, candlesize, strategy_name, parameters_json)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                owner = excluded.owner,
                trade_pair = excluded.trade_pair,
                candlesize = excluded.candlesize,
                strategy_name = excluded.strategy_name,
                parameters_json = excluded.parameters_json
            "#,
        )
        .bind(&algo.name)
        .bind(&algo.owner)
        .bind(algo.pair.key())
        .bind(algo.resolution.as_str())
        .bind(&algo.strategy_name)
        .bind(algo.strategy_parameters.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("insert algo", e))?;
        Ok(())
    }

    async fn find(&self, _id: Uuid) -> Result<Option<Algo>, PersistenceError> {
        // Algos are keyed by name, not uuid; real lookups go through
        // `find_by_name`/`find_by_owner` below.
        Ok(None)
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<Algo>, PersistenceError> {
        let rows = sqlx::query("SELECT * FROM algos WHERE owner = ?")
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("find algos by owner", e))?;
        rows.iter().map(algo_of_row).collect()
    }
}

impl SqliteAlgoRepository {
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Algo>, PersistenceError> {
        let row = sqlx::query("SELECT * FROM algos WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("find algo by name", e))?;
        row.as_ref().map(algo_of_row).transpose()
    }

    pub async fn delete(&self, name: &str) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM algos WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("delete algo", e))?;
        Ok(())
    }
}

pub struct SqliteDeploymentRepository {
    pool: SqlitePool,
}

impl SqliteDeploymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn deployment_of_row(row: &sqlx::sqlite::SqliteRow) -> Result<Deployment, PersistenceError> {
    let id: String = row.try_get("id").map_err(|e| query_failed("id", e))?;
    let pair_key: String = row.try_get("trade_pair").map_err(|e| query_failed("trade_pair", e))?;
    let pair = TradingPair::from_key(&pair_key)
        .ok_or_else(|| PersistenceError::QueryFailed(format!("malformed trade_pair: {pair_key}")))?;
    let candlesize: String = row.try_get("candlesize").map_err(|e| query_failed("candlesize", e))?;
    let resolution = Resolution::from_str(&candlesize).map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
    let parameters_json: String = row.try_get("parameters_json").map_err(|e| query_failed("parameters_json", e))?;
    let strategy_parameters = serde_json::from_str(&parameters_json)
        .map_err(|e| PersistenceError::QueryFailed(format!("malformed parameters_json: {e}")))?;
    let status: String = row.try_get("status").map_err(|e| query_failed("status", e))?;
    let num_cycles: i64 = row.try_get("num_cycles").map_err(|e| query_failed("num_cycles", e))?;

    Ok(Deployment {
        id: Uuid::from_str(&id).map_err(|e| PersistenceError::QueryFailed(format!("malformed id: {e}")))?,
        owner: row.try_get("owner").map_err(|e| query_failed("owner", e))?,
        algo: Algo {
            name: row.try_get("algo_name").map_err(|e| query_failed("algo_name", e))?,
            owner: row.try_get("owner").map_err(|e| query_failed("owner", e))?,
            pair,
            resolution,
            strategy_name: row.try_get("strategy_name").map_err(|e| query_failed("strategy_name", e))?,
            strategy_parameters,
        },
        status: parse_deployment_status(&status),
        amount: decimal_of(row, "amount")?,
        num_cycles: num_cycles as u32,
    })
}

#[async_trait]
impl DeploymentRepository for SqliteDeploymentRepository {
    async fn save(&self, deployment: &Deployment) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO deployed_algos
                (id, owner, algo_name, amount, num_cycles, status, trade_pair, candlesize, strategy_name, parameters_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                amount = excluded.amount,
                num_cycles = excluded.num_cycles,
                status = excluded.status
            "#,
        )
        .bind(deployment.id.to_string())
        .bind(&deployment.owner)
        .bind(&deployment.algo.name)
        .bind(deployment.amount.to_string())
        .bind(deployment.num_cycles as i64)
        .bind(deployment.status.as_str())
        .bind(deployment.algo.pair.key())
        .bind(deployment.algo.resolution.as_str())
        .bind(&deployment.algo.strategy_name)
        .bind(deployment.algo.strategy_parameters.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("insert deployment", e))?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Deployment>, PersistenceError> {
        let row = sqlx::query("SELECT * FROM deployed_algos WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("find deployment", e))?;
        row.as_ref().map(deployment_of_row).transpose()
    }

    async fn find_active(&self) -> Result<Vec<Deployment>, PersistenceError> {
        let rows = sqlx::query("SELECT * FROM deployed_algos WHERE status = 'running'")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("find active deployments", e))?;
        rows.iter().map(deployment_of_row).collect()
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<Deployment>, PersistenceError> {
        let rows = sqlx::query("SELECT * FROM deployed_algos WHERE owner = ?")
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("find deployments by owner", e))?;
        rows.iter().map(deployment_of_row).collect()
    }
}

fn trade_record_of_row(row: &sqlx::sqlite::SqliteRow, owner: TradeOwner) -> Result<TradeRecord, PersistenceError> {
    let ts: String = row.try_get("ts").map_err(|e| query_failed("ts", e))?;
    let advice: String = row.try_get("advice").map_err(|e| query_failed("advice", e))?;
    Ok(TradeRecord {
        timestamp: DateTime::parse_from_rfc3339(&ts)
            .map_err(|e| PersistenceError::QueryFailed(format!("malformed ts: {e}")))?
            .with_timezone(&Utc),
        owner,
        advice: parse_advice(&advice),
        sold_asset: row.try_get("sold_asset").map_err(|e| query_failed("sold_asset", e))?,
        sold_amount: decimal_of(row, "sold_amount")?,
        bought_asset: row.try_get("bought_asset").map_err(|e| query_failed("bought_asset", e))?,
        bought_amount: decimal_of(row, "bought_amount")?,
    })
}

/// Backs the `trades` table: one row per executed trade for a live
/// deployment.
pub struct SqliteTradeRecordRepository {
    pool: SqlitePool,
}

impl SqliteTradeRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeRecordRepository for SqliteTradeRecordRepository {
    async fn save(&self, record: &TradeRecord) -> Result<(), PersistenceError> {
        let TradeOwner::Deployment(did) = record.owner else {
            return Err(PersistenceError::WriteFailed {
                attempts: 1,
                reason: "trades table only accepts deployment-owned records".to_string(),
            });
        };
        sqlx::query(
            r#"
            INSERT INTO trades (ts, deployment_id, advice, sold_asset, sold_amount, bought_asset, bought_amount)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.timestamp.to_rfc3339())
        .bind(did.to_string())
        .bind(record.advice.to_string())
        .bind(&record.sold_asset)
        .bind(record.sold_amount.to_string())
        .bind(&record.bought_asset)
        .bind(record.bought_amount.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("insert trade", e))?;
        Ok(())
    }

    async fn find_by_owner(&self, owner: TradeOwner) -> Result<Vec<TradeRecord>, PersistenceError> {
        let TradeOwner::Deployment(did) = owner else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query("SELECT * FROM trades WHERE deployment_id = ? ORDER BY ts")
            .bind(did.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("find trades by deployment", e))?;
        rows.iter().map(|r| trade_record_of_row(r, owner)).collect()
    }
}

/// Backs the `backtest_trades` table: one row per simulated trade for a
/// backtest run.
pub struct SqliteBacktestTradeRecordRepository {
    pool: SqlitePool,
}

impl SqliteBacktestTradeRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeRecordRepository for SqliteBacktestTradeRecordRepository {
    async fn save(&self, record: &TradeRecord) -> Result<(), PersistenceError> {
        let TradeOwner::Backtest(bid) = record.owner else {
            return Err(PersistenceError::WriteFailed {
                attempts: 1,
                reason: "backtest_trades table only accepts backtest-owned records".to_string(),
            });
        };
        sqlx::query(
            r#"
            INSERT INTO backtest_trades (ts, backtest_id, advice, sold_asset, sold_amount, bought_asset, bought_amount)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.timestamp.to_rfc3339())
        .bind(bid.to_string())
        .bind(record.advice.to_string())
        .bind(&record.sold_asset)
        .bind(record.sold_amount.to_string())
        .bind(&record.bought_asset)
        .bind(record.bought_amount.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("insert backtest trade", e))?;
        Ok(())
    }

    async fn find_by_owner(&self, owner: TradeOwner) -> Result<Vec<TradeRecord>, PersistenceError> {
        let TradeOwner::Backtest(bid) = owner else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query("SELECT * FROM backtest_trades WHERE backtest_id = ? ORDER BY ts")
            .bind(bid.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("find backtest trades", e))?;
        rows.iter().map(|r| trade_record_of_row(r, owner)).collect()
    }
}

fn backtest_request_of_row(row: &sqlx::sqlite::SqliteRow) -> Result<BacktestRequest, PersistenceError> {
    let id: String = row.try_get("id").map_err(|e| query_failed("id", e))?;
    let pair_key: String = row.try_get("trade_pair").map_err(|e| query_failed("trade_pair", e))?;
    let pair = TradingPair::from_key(&pair_key)
        .ok_or_else(|| PersistenceError::QueryFailed(format!("malformed trade_pair: {pair_key}")))?;
    let candlesize: String = row.try_get("candlesize").map_err(|e| query_failed("candlesize", e))?;
    let resolution = Resolution::from_str(&candlesize).map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
    let parameters_json: String = row.try_get("parameters_json").map_err(|e| query_failed("parameters_json", e))?;
    let strategy_parameters = serde_json::from_str(&parameters_json)
        .map_err(|e| PersistenceError::QueryFailed(format!("malformed parameters_json: {e}")))?;
    let start_ts: String = row.try_get("start_ts").map_err(|e| query_failed("start_ts", e))?;
    let end_ts: String = row.try_get("end_ts").map_err(|e| query_failed("end_ts", e))?;
    let status: String = row.try_get("status").map_err(|e| query_failed("status", e))?;

    Ok(BacktestRequest {
        id: Uuid::from_str(&id).map_err(|e| PersistenceError::QueryFailed(format!("malformed id: {e}")))?,
        owner: row.try_get("owner").map_err(|e| query_failed("owner", e))?,
        algo: Algo {
            name: row.try_get("algo_name").map_err(|e| query_failed("algo_name", e))?,
            owner: row.try_get("owner").map_err(|e| query_failed("owner", e))?,
            pair,
            resolution,
            strategy_name: row.try_get("strategy_name").map_err(|e| query_failed("strategy_name", e))?,
            strategy_parameters,
        },
        start_ts: DateTime::parse_from_rfc3339(&start_ts)
            .map_err(|e| PersistenceError::QueryFailed(format!("malformed start_ts: {e}")))?
            .with_timezone(&Utc),
        end_ts: DateTime::parse_from_rfc3339(&end_ts)
            .map_err(|e| PersistenceError::QueryFailed(format!("malformed end_ts: {e}")))?
            .with_timezone(&Utc),
        status: parse_backtest_status(&status),
    })
}

pub struct SqliteBacktestRequestRepository {
    pool: SqlitePool,
}

impl SqliteBacktestRequestRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BacktestRequestRepository for SqliteBacktestRequestRepository {
    async fn save(&self, request: &BacktestRequest) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO backtest_request
                (id, owner, algo_name, start_ts, end_ts, trade_pair, candlesize, strategy_name, parameters_json, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request.id.to_string())
        .bind(&request.owner)
        .bind(&request.algo.name)
        .bind(request.start_ts.to_rfc3339())
        .bind(request.end_ts.to_rfc3339())
        .bind(request.algo.pair.key())
        .bind(request.algo.resolution.as_str())
        .bind(&request.algo.strategy_name)
        .bind(request.algo.strategy_parameters.to_string())
        .bind(request.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("insert backtest request", e))?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<BacktestRequest>, PersistenceError> {
        let row = sqlx::query("SELECT * FROM backtest_request WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("find backtest request", e))?;
        row.as_ref().map(backtest_request_of_row).transpose()
    }

    async fn update_status(&self, id: Uuid, status: BacktestStatus) -> Result<(), PersistenceError> {
        sqlx::query("UPDATE backtest_request SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("update backtest request status", e))?;
        Ok(())
    }

    async fn find_oldest_new(&self) -> Result<Option<BacktestRequest>, PersistenceError> {
        let row = sqlx::query("SELECT * FROM backtest_request WHERE status = 'new' ORDER BY rowid LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("find oldest new backtest request", e))?;
        row.as_ref().map(backtest_request_of_row).transpose()
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<BacktestRequest>, PersistenceError> {
        let rows = sqlx::query("SELECT * FROM backtest_request WHERE owner = ? ORDER BY rowid")
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("find backtest requests by owner", e))?;
        rows.iter().map(backtest_request_of_row).collect()
    }
}

/// Precomputed bucket columns for `sdex_ohlcv`, derived from a candle's
/// start timestamp using the same floor-division convention as
/// [`Resolution::same_bucket`].
struct Buckets {
    year: i32,
    month: u32,
    week: u32,
    day: u32,
    hour4: u32,
    hour: u32,
    minute15: u32,
    minute5: u32,
    minute: u32,
}

fn buckets_of(ts: DateTime<Utc>) -> Buckets {
    Buckets {
        year: ts.year(),
        month: ts.month(),
        week: resolution::week_number(ts),
        day: ts.day(),
        hour4: ts.hour() / 4,
        hour: ts.hour(),
        minute15: ts.minute() / 15,
        minute5: ts.minute() / 5,
        minute: ts.minute(),
    }
}

fn candle_of_row(row: &sqlx::sqlite::SqliteRow) -> Result<Candle, PersistenceError> {
    let pair_key: String = row.try_get("trade_pair").map_err(|e| query_failed("trade_pair", e))?;
    let pair = TradingPair::from_key(&pair_key)
        .ok_or_else(|| PersistenceError::QueryFailed(format!("malformed trade_pair: {pair_key}")))?;
    let ts: String = row.try_get("ts").map_err(|e| query_failed("ts", e))?;
    Ok(Candle {
        pair,
        start: DateTime::parse_from_rfc3339(&ts)
            .map_err(|e| PersistenceError::QueryFailed(format!("malformed ts: {e}")))?
            .with_timezone(&Utc),
        open: decimal_of(row, "open")?,
        high: decimal_of(row, "high")?,
        low: decimal_of(row, "low")?,
        close: decimal_of(row, "close")?,
        base_volume: decimal_of(row, "base_volume")?,
        counter_volume: decimal_of(row, "counter_volume")?,
    })
}

pub struct SqliteCandleRepository {
    pool: SqlitePool,
}

impl SqliteCandleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandleRepository for SqliteCandleRepository {
    async fn save(&self, candle: &Candle, _resolution: Resolution) -> Result<(), PersistenceError> {
        let b = buckets_of(candle.start);
        sqlx::query(
            r#"
            INSERT INTO sdex_ohlcv
                (trade_pair, ts, year, month, week, day, hour4, hour, minute15, minute5, minute,
                 open, high, low, close, base_volume, counter_volume)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(candle.pair.key())
        .bind(candle.start.to_rfc3339())
        .bind(b.year)
        .bind(b.month)
        .bind(b.week)
        .bind(b.day)
        .bind(b.hour4)
        .bind(b.hour)
        .bind(b.minute15)
        .bind(b.minute5)
        .bind(b.minute)
        .bind(candle.open.to_string())
        .bind(candle.high.to_string())
        .bind(candle.low.to_string())
        .bind(candle.close.to_string())
        .bind(candle.base_volume.to_string())
        .bind(candle.counter_volume.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("insert candle", e))?;
        Ok(())
    }

    async fn find_range(
        &self,
        pair: &TradingPair,
        resolution: Resolution,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, PersistenceError> {
        let rows = sqlx::query("SELECT * FROM sdex_ohlcv WHERE trade_pair = ? AND ts BETWEEN ? AND ? ORDER BY id")
            .bind(pair.key())
            .bind(start.to_rfc3339())
            .bind(end.to_rfc3339())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("find candle range", e))?;

        let minute_rows = rows.iter().map(candle_of_row).collect::<Result<Vec<_>, _>>()?;
        if resolution == Resolution::OneMin {
            return Ok(minute_rows);
        }

        let mut aggregated: Vec<Candle> = Vec::new();
        for row in minute_rows {
            match aggregated.last_mut() {
                Some(last) if resolution.same_bucket(last.start, row.start) => last.merge(&row),
                _ => aggregated.push(row),
            }
        }
        Ok(aggregated)
    }

    async fn find_minute_page(
        &self,
        pair: &TradingPair,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        after_row_id: i64,
        limit: usize,
    ) -> Result<Vec<(i64, Candle)>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM sdex_ohlcv
            WHERE trade_pair = ? AND ts BETWEEN ? AND ? AND id > ?
            ORDER BY id
            LIMIT ?
            "#,
        )
        .bind(pair.key())
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .bind(after_row_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("find minute page", e))?;

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id").map_err(|e| query_failed("id", e))?;
                Ok((id, candle_of_row(row)?))
            })
            .collect()
    }
}

pub struct SqliteStateRepository {
    pool: SqlitePool,
}

impl SqliteStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateRepository for SqliteStateRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let row = sqlx::query("SELECT value FROM state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("get state", e))?;
        row.map(|r| r.try_get("value").map_err(|e| query_failed("value", e))).transpose()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO state (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("set state", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::asset::Asset;
    use crate::infrastructure::persistence::database::Database;
    use rust_decimal_macros::dec;

    fn pair() -> TradingPair {
        TradingPair::new(Asset::Native, Asset::issued("USD", "IssuerA"))
    }

    async fn main_db() -> Database {
        Database::main("sqlite::memory:").await.unwrap()
    }

    async fn backtest_db() -> Database {
        Database::backtest("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn algo_round_trips_through_sqlite() {
        let db = main_db().await;
        let repo = SqliteAlgoRepository::new(db.pool.clone());
        let algo = Algo {
            name: "my-algo".to_string(),
            owner: "alice".to_string(),
            pair: pair(),
            resolution: Resolution::OneMin,
            strategy_name: "macd".to_string(),
            strategy_parameters: serde_json::json!({"fast_period": 10}),
        };
        repo.save(&algo).await.unwrap();
        let found = repo.find_by_name("my-algo").await.unwrap().unwrap();
        assert_eq!(found.strategy_name, "macd");
        assert_eq!(found.pair, pair());
    }

    #[tokio::test]
    async fn candle_find_minute_page_is_ordered_and_excludes_already_seen_rows() {
        let db = main_db().await;
        let repo = SqliteCandleRepository::new(db.pool.clone());
        let start = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        for m in 0..3 {
            let ts = start + chrono::Duration::minutes(m);
            let candle = Candle::open_with(pair(), ts, dec!(1), dec!(1), dec!(1));
            repo.save(&candle, Resolution::OneMin).await.unwrap();
        }

        let window_end = start + chrono::Duration::hours(1);
        let first_page = repo.find_minute_page(&pair(), start, window_end, 0, 2).await.unwrap();
        assert_eq!(first_page.len(), 2);

        let last_id = first_page.last().unwrap().0;
        let second_page = repo.find_minute_page(&pair(), start, window_end, last_id, 2).await.unwrap();
        assert_eq!(second_page.len(), 1);
    }

    #[tokio::test]
    async fn backtest_request_find_oldest_new_ignores_running_requests() {
        let db = backtest_db().await;
        let repo = SqliteBacktestRequestRepository::new(db.pool.clone());
        let algo = Algo {
            name: "algo".to_string(),
            owner: "bob".to_string(),
            pair: pair(),
            resolution: Resolution::OneMin,
            strategy_name: "dummy".to_string(),
            strategy_parameters: serde_json::json!({}),
        };
        let now = chrono::Utc::now();
        let request = BacktestRequest {
            id: Uuid::new_v4(),
            owner: "bob".to_string(),
            algo,
            start_ts: now,
            end_ts: now,
            status: BacktestStatus::New,
        };
        repo.save(&request).await.unwrap();
        let found = repo.find_oldest_new().await.unwrap().unwrap();
        assert_eq!(found.id, request.id);

        repo.update_status(request.id, BacktestStatus::Running).await.unwrap();
        assert!(repo.find_oldest_new().await.unwrap().is_none());
    }
}
