use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::advice::Advice;

/// The owner of a [`TradeRecord`]: either a live deployment or a backtest
/// run. Trades and backtest trades are stored in separate tables but share
/// this shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TradeOwner {
    Deployment(Uuid),
    Backtest(Uuid),
}

/// Append-only record of an executed (or simulated) trade.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub owner: TradeOwner,
    pub advice: Advice,
    pub sold_asset: String,
    pub sold_amount: Decimal,
    pub bought_asset: String,
    pub bought_amount: Decimal,
}
