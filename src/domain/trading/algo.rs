use crate::domain::market::{Resolution, TradingPair};

/// User-defined template. Immutable once created; deletable by the owner.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Algo {
    pub name: String,
    pub owner: String,
    pub pair: TradingPair,
    pub resolution: Resolution,
    pub strategy_name: String,
    pub strategy_parameters: serde_json::Value,
}
