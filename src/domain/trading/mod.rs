pub mod advice;
pub mod algo;
pub mod backtest;
pub mod deployment;
pub mod trade_context;
pub mod trade_record;

pub use advice::{Advice, TradeAdvice};
pub use algo::Algo;
pub use backtest::{BacktestRequest, BacktestStatus};
pub use deployment::{Deployment, DeploymentStatus};
pub use trade_context::{SequenceDecision, TradeContext, TradeContextMap};
pub use trade_record::{TradeOwner, TradeRecord};
