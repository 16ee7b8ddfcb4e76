//! Repository Pattern Abstractions
//!
//! Separates the application layer from the concrete storage engine behind
//! each of the seven logical tables: algos, deployed algos, trades, backtest
//! requests, backtest trades, the historical candle store, and fetcher
//! cursor state.
//!
//! # Current Implementation
//!
//! `infrastructure::persistence` provides a single SQLite-backed
//! implementation of each trait, built on `sqlx`.
//!
//! # Future
//!
//! Nothing here is SQLite-specific; a Postgres implementation could be
//! dropped in behind the same traits without touching application code.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::PersistenceError;
use crate::domain::market::{Candle, Resolution, TradingPair};
use crate::domain::trading::{Algo, BacktestRequest, Deployment, TradeOwner, TradeRecord};

#[async_trait]
pub trait AlgoRepository: Send + Sync {
    async fn save(&self, algo: &Algo) -> Result<(), PersistenceError>;
    async fn find(&self, id: Uuid) -> Result<Option<Algo>, PersistenceError>;
    async fn find_by_owner(&self, owner: &str) -> Result<Vec<Algo>, PersistenceError>;
}

#[async_trait]
pub trait DeploymentRepository: Send + Sync {
    async fn save(&self, deployment: &Deployment) -> Result<(), PersistenceError>;
    async fn find(&self, id: Uuid) -> Result<Option<Deployment>, PersistenceError>;
    async fn find_active(&self) -> Result<Vec<Deployment>, PersistenceError>;
    async fn find_by_owner(&self, owner: &str) -> Result<Vec<Deployment>, PersistenceError>;
}

#[async_trait]
pub trait TradeRecordRepository: Send + Sync {
    async fn save(&self, record: &TradeRecord) -> Result<(), PersistenceError>;
    async fn find_by_owner(&self, owner: TradeOwner) -> Result<Vec<TradeRecord>, PersistenceError>;
}

#[async_trait]
pub trait BacktestRequestRepository: Send + Sync {
    async fn save(&self, request: &BacktestRequest) -> Result<(), PersistenceError>;
    async fn find(&self, id: Uuid) -> Result<Option<BacktestRequest>, PersistenceError>;
    async fn update_status(
        &self,
        id: Uuid,
        status: crate::domain::trading::BacktestStatus,
    ) -> Result<(), PersistenceError>;
    /// The oldest request still in state NEW, if any. Backs the Backtest
    /// Runner's poll loop.
    async fn find_oldest_new(&self) -> Result<Option<BacktestRequest>, PersistenceError>;
    async fn find_by_owner(&self, owner: &str) -> Result<Vec<BacktestRequest>, PersistenceError>;
}

/// The historical OHLCV candle store the Backtest Runner and Historical
/// Query Layer read from, and the Candle Aggregator/Fan-out write to.
#[async_trait]
pub trait CandleRepository: Send + Sync {
    async fn save(&self, candle: &Candle, resolution: Resolution) -> Result<(), PersistenceError>;

    async fn find_range(
        &self,
        pair: &TradingPair,
        resolution: Resolution,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, PersistenceError>;

    /// Raw 1-minute rows for `pair` within `[start, end]`, ordered by row id
    /// (which is also timestamp-ordered), starting just after `after_row_id`
    /// and returning at most `limit` rows. Backs the Historical Candle Store
    /// Query Layer's on-the-fly re-aggregation, which needs a stable row id
    /// to use as a page token.
    async fn find_minute_page(
        &self,
        pair: &TradingPair,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        after_row_id: i64,
        limit: usize,
    ) -> Result<Vec<(i64, Candle)>, PersistenceError>;
}

/// Arbitrary key-value state, currently used only to persist the fetcher's
/// last-seen trade cursor across restarts.
#[async_trait]
pub trait StateRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}
