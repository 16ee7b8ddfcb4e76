use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::algo::Algo;

/// Status transitions are monotone: `New → Running → {Error, Finished}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BacktestStatus {
    New,
    Running,
    Error,
    Finished,
}

impl BacktestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BacktestStatus::New => "new",
            BacktestStatus::Running => "running",
            BacktestStatus::Error => "error",
            BacktestStatus::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BacktestRequest {
    pub id: Uuid,
    pub owner: String,
    pub algo: Algo,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub status: BacktestStatus,
}
