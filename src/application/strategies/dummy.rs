//! Alternates BUY/SELL advice every 100 processed candles. Registers the
//! same MACD indicator the real strategy uses but ignores its value; kept
//! around as a cheap end-to-end smoke test for new deployments.

use crate::domain::errors::ConfigError;
use crate::domain::market::Candle;
use crate::domain::strategy::{IndicatorRegistrar, IndicatorValues, TradingStrategy};
use crate::domain::trading::Advice;

pub struct DummyStrategy {
    last_advice: Option<Advice>,
    skipped: u32,
}

impl DummyStrategy {
    pub fn new(_parameters: &serde_json::Value) -> Self {
        Self {
            last_advice: None,
            skipped: 0,
        }
    }
}

impl TradingStrategy for DummyStrategy {
    fn name(&self) -> &str {
        "dummy"
    }

    fn init(&mut self, registrar: &mut dyn IndicatorRegistrar) -> Result<(), ConfigError> {
        self.last_advice = None;
        self.skipped = 0;
        registrar.add_indicator("macdx", "macd", &serde_json::json!({}))
    }

    fn process_candle(&mut self, _candle: &Candle) {
        self.skipped += 1;
    }

    fn execute(&mut self, _indicators: &IndicatorValues) -> Option<Advice> {
        if self.skipped != 100 {
            return None;
        }
        self.skipped = 0;

        let advice = match self.last_advice {
            None | Some(Advice::Sell) => Advice::Buy,
            Some(Advice::Buy) => Advice::Sell,
        };
        self.last_advice = Some(advice);
        Some(advice)
    }
}
