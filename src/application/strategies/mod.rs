pub mod dummy;
pub mod macd;

use std::sync::Arc;

use crate::domain::strategy::StrategyRegistry;

use dummy::DummyStrategy;
use macd::MacdStrategy;

/// Builds the registry of strategies known at startup. Deploying or
/// backtesting an algo whose `strategy_name` is not registered here fails
/// with `ConfigError::UnknownStrategy`.
pub fn default_registry() -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    registry.register("macd", Arc::new(|params| Box::new(MacdStrategy::new(params))));
    registry.register("dummy", Arc::new(|params| Box::new(DummyStrategy::new(params))));
    registry
}
