//! SQLite-backed implementations of the `domain::repositories` traits.

pub mod database;
pub mod repositories;

pub use database::Database;
pub use repositories::{
    SqliteAlgoRepository, SqliteBacktestRequestRepository, SqliteBacktestTradeRecordRepository,
    SqliteCandleRepository, SqliteDeploymentRepository, SqliteStateRepository,
    SqliteTradeRecordRepository,
};
