use std::fmt;

/// A strategy's buy-or-sell signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Advice {
    Buy,
    Sell,
}

impl fmt::Display for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advice::Buy => write!(f, "buy"),
            Advice::Sell => write!(f, "sell"),
        }
    }
}

/// Raw advice tagged with its deployment context, as forwarded by the
/// Advice Dispatcher onto the global advice bus.
#[derive(Debug, Clone)]
pub struct TradeAdvice {
    pub user_id: String,
    pub deployment_id: uuid::Uuid,
    pub pair: crate::domain::market::TradingPair,
    pub advice: Advice,
    pub amount: rust_decimal::Decimal,
    pub num_cycles: u32,
}
