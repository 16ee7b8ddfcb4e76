//! Trend-following strategy on the MACD line: declares an up- or down-trend
//! once MACD crosses a threshold, waits for it to persist `trend_stickiness`
//! candles, then advises once per trend (see
//! http://trader.wikia.com/wiki/MACD for the underlying indicator).

use crate::domain::errors::ConfigError;
use crate::domain::market::Candle;
use crate::domain::strategy::{IndicatorRegistrar, IndicatorValues, TradingStrategy};
use crate::domain::trading::Advice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrendDirection {
    None,
    Up,
    Down,
}

pub struct MacdStrategy {
    threshold_up: f64,
    threshold_down: f64,
    trend_stickiness: u32,
    trend_direction: TrendDirection,
    trend_duration: u32,
    trend_persisted: bool,
    trend_advised: bool,
}

impl MacdStrategy {
    pub fn new(parameters: &serde_json::Value) -> Self {
        Self {
            threshold_up: parameters
                .get("threshold_up")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.025),
            threshold_down: parameters
                .get("threshold_down")
                .and_then(|v| v.as_f64())
                .unwrap_or(-0.025),
            trend_stickiness: parameters
                .get("trend_stickiness")
                .and_then(|v| v.as_u64())
                .unwrap_or(1) as u32,
            trend_direction: TrendDirection::None,
            trend_duration: 0,
            trend_persisted: false,
            trend_advised: false,
        }
    }
}

impl TradingStrategy for MacdStrategy {
    fn name(&self) -> &str {
        "macd"
    }

    fn init(&mut self, registrar: &mut dyn IndicatorRegistrar) -> Result<(), ConfigError> {
        self.trend_direction = TrendDirection::None;
        self.trend_duration = 0;
        self.trend_persisted = false;
        self.trend_advised = false;

        registrar.add_indicator(
            "macdx",
            "macd",
            &serde_json::json!({
                "fast_period": 10,
                "slow_period": 21,
                "signal_period": 9,
            }),
        )
    }

    fn process_candle(&mut self, _candle: &Candle) {
        self.trend_duration += 1;
    }

    fn execute(&mut self, indicators: &IndicatorValues) -> Option<Advice> {
        let macd = indicators.get("macdx").and_then(|o| o.get("macd")).copied().flatten()?;

        if macd > self.threshold_up {
            if self.trend_direction != TrendDirection::Up {
                self.trend_direction = TrendDirection::Up;
                self.trend_duration = 0;
                self.trend_persisted = false;
                self.trend_advised = false;
            }
            if self.trend_duration >= self.trend_stickiness {
                self.trend_persisted = true;
            }
            if self.trend_persisted && !self.trend_advised {
                self.trend_advised = true;
                return Some(Advice::Buy);
            }
        } else if macd < self.threshold_down {
            if self.trend_direction != TrendDirection::Down {
                self.trend_direction = TrendDirection::Down;
                self.trend_duration = 0;
                self.trend_persisted = false;
                self.trend_advised = false;
            }
            if self.trend_duration >= self.trend_stickiness {
                self.trend_persisted = true;
            }
            if self.trend_persisted && !self.trend_advised {
                self.trend_advised = true;
                return Some(Advice::Sell);
            }
        }

        None
    }
}
