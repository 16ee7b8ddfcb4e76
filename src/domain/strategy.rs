use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;

use super::errors::ConfigError;
use super::market::candle::Candle;
use super::trading::Advice;

/// Append-only OHLCV history the Strategy Worker (and, identically, the
/// Backtest Runner) feeds every registered indicator from. Bounded growth is
/// the caller's responsibility; this type is a plain accumulator.
#[derive(Debug, Clone, Default)]
pub struct Ohlcv {
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl Ohlcv {
    pub fn push_candle(&mut self, candle: &Candle) {
        self.open.push(candle.open.to_f64().unwrap_or(f64::NAN));
        self.high.push(candle.high.to_f64().unwrap_or(f64::NAN));
        self.low.push(candle.low.to_f64().unwrap_or(f64::NAN));
        self.close.push(candle.close.to_f64().unwrap_or(f64::NAN));
        self.volume
            .push(candle.base_volume.to_f64().unwrap_or(f64::NAN));
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }
}

/// The last-computed output of one registered indicator: named sub-values
/// (e.g. `macd`/`macdsignal`/`macdhist`), each `None` while the indicator is
/// still warming up (a NaN output translated to null, per the design notes).
pub type IndicatorOutput = HashMap<String, Option<f64>>;

/// `indicator_values` as handed to a strategy's `execute` hook: local name ->
/// last-computed output.
pub type IndicatorValues = HashMap<String, IndicatorOutput>;

/// A concrete strategy implementation. Strategies are polymorphic over this
/// fixed capability set only; the Strategy Worker owns all "base" logic
/// (history tracking, indicator recomputation, advice emission).
pub trait TradingStrategy: Send {
    fn name(&self) -> &str;

    /// Called once before the worker starts feeding candles. Implementations
    /// typically register the indicators they need via `registrar`.
    fn init(&mut self, registrar: &mut dyn IndicatorRegistrar) -> Result<(), ConfigError>;

    /// Called once per new candle, before `execute`, with the candle that was
    /// just appended to history.
    fn process_candle(&mut self, candle: &Candle);

    /// Called once per worker iteration with the latest indicator values.
    /// Returns `Some(advice)` to emit a buy/sell signal this iteration.
    fn execute(&mut self, indicators: &IndicatorValues) -> Option<Advice>;
}

/// Capability a strategy's `init` hook uses to register an indicator under a
/// local name. Implemented by the Strategy Worker (and the Backtest Runner's
/// equivalent harness); kept as a trait so strategy code does not depend on
/// either concrete driver.
pub trait IndicatorRegistrar {
    fn add_indicator(
        &mut self,
        local_name: &str,
        indicator_type: &str,
        parameters: &serde_json::Value,
    ) -> Result<(), ConfigError>;
}

pub type StrategyFactory = Arc<dyn Fn(&serde_json::Value) -> Box<dyn TradingStrategy> + Send + Sync>;

/// Maps strategy names to factories. Populated once at startup (see
/// `application::strategies::registry`); looked up by the Engine Controller
/// on DEPLOY and by the Backtest Runner on each backtest request.
#[derive(Default)]
pub struct StrategyRegistry {
    factories: HashMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: StrategyFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn build(
        &self,
        name: &str,
        parameters: &serde_json::Value,
    ) -> Result<Box<dyn TradingStrategy>, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownStrategy(name.to_string()))?;
        Ok(factory(parameters))
    }
}
