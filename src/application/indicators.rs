//! Batch indicator recomputation backing the Strategy Worker and Backtest
//! Runner. Per the run-loop contract, every registered indicator is rebuilt
//! from scratch and fed the *entire* rolling history on each recompute; only
//! the last output is kept. This costs more than incremental state but is
//! what the spec's contract requires, and keeps the indicator layer a pure
//! function of `(kind, parameters, history)`.

use ta::indicators::{
    AverageTrueRange, BollingerBands, ExponentialMovingAverage,
    MovingAverageConvergenceDivergence, RelativeStrengthIndex, SimpleMovingAverage,
};
use ta::Next;

use tracing::error;

use crate::domain::errors::ConfigError;
use crate::domain::strategy::{IndicatorRegistrar, IndicatorOutput, IndicatorValues, Ohlcv};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorType {
    Sma,
    Ema,
    Rsi,
    Macd,
    BollingerBands,
    Atr,
}

impl IndicatorType {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "sma" => Ok(IndicatorType::Sma),
            "ema" => Ok(IndicatorType::Ema),
            "rsi" => Ok(IndicatorType::Rsi),
            "macd" => Ok(IndicatorType::Macd),
            "bbands" => Ok(IndicatorType::BollingerBands),
            "atr" => Ok(IndicatorType::Atr),
            other => Err(ConfigError::UnknownIndicator(other.to_string())),
        }
    }
}

fn param_usize(parameters: &serde_json::Value, key: &str, default: usize) -> usize {
    parameters
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(default)
}

fn param_f64(parameters: &serde_json::Value, key: &str, default: f64) -> f64 {
    parameters
        .get(key)
        .and_then(|v| v.as_f64())
        .unwrap_or(default)
}

fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidIndicatorParameters {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Rebuilds the named indicator and replays `history` through it, returning
/// the last computed sub-values keyed by their conventional names
/// (`"sma"`, `"macd"`/`"macdsignal"`/`"macdhist"`, ...). NaN outputs (warm-up)
/// are translated to `None`.
pub fn recompute(
    local_name: &str,
    kind: IndicatorType,
    parameters: &serde_json::Value,
    history: &Ohlcv,
) -> Result<IndicatorOutput, ConfigError> {
    let mut out = IndicatorOutput::new();
    let nan_or = |v: f64| if v.is_nan() { None } else { Some(v) };

    match kind {
        IndicatorType::Sma => {
            let period = param_usize(parameters, "period", 30);
            let mut sma = SimpleMovingAverage::new(period)
                .map_err(|e| invalid(local_name, e.to_string()))?;
            let mut last = f64::NAN;
            for &close in &history.close {
                last = sma.next(close);
            }
            out.insert("sma".to_string(), nan_or(last));
        }
        IndicatorType::Ema => {
            let period = param_usize(parameters, "period", 30);
            let mut ema = ExponentialMovingAverage::new(period)
                .map_err(|e| invalid(local_name, e.to_string()))?;
            let mut last = f64::NAN;
            for &close in &history.close {
                last = ema.next(close);
            }
            out.insert("ema".to_string(), nan_or(last));
        }
        IndicatorType::Rsi => {
            let period = param_usize(parameters, "period", 14);
            let mut rsi = RelativeStrengthIndex::new(period)
                .map_err(|e| invalid(local_name, e.to_string()))?;
            let mut last = f64::NAN;
            for &close in &history.close {
                last = rsi.next(close);
            }
            out.insert("rsi".to_string(), nan_or(last));
        }
        IndicatorType::Macd => {
            let fast = param_usize(parameters, "fast_period", 12);
            let slow = param_usize(parameters, "slow_period", 26);
            let signal = param_usize(parameters, "signal_period", 9);
            let mut macd = MovingAverageConvergenceDivergence::new(fast, slow, signal)
                .map_err(|e| invalid(local_name, e.to_string()))?;
            let mut last = (f64::NAN, f64::NAN, f64::NAN);
            for &close in &history.close {
                let v = macd.next(close);
                last = (v.macd, v.signal, v.histogram);
            }
            out.insert("macd".to_string(), nan_or(last.0));
            out.insert("macdsignal".to_string(), nan_or(last.1));
            out.insert("macdhist".to_string(), nan_or(last.2));
        }
        IndicatorType::BollingerBands => {
            let period = param_usize(parameters, "period", 20);
            let std_dev = param_f64(parameters, "std_dev", 2.0);
            let mut bb = BollingerBands::new(period, std_dev)
                .map_err(|e| invalid(local_name, e.to_string()))?;
            let mut last = (f64::NAN, f64::NAN, f64::NAN);
            for &close in &history.close {
                let v = bb.next(close);
                last = (v.upper, v.average, v.lower);
            }
            out.insert("upperband".to_string(), nan_or(last.0));
            out.insert("middleband".to_string(), nan_or(last.1));
            out.insert("lowerband".to_string(), nan_or(last.2));
        }
        IndicatorType::Atr => {
            let period = param_usize(parameters, "period", 14);
            let mut atr = AverageTrueRange::new(period)
                .map_err(|e| invalid(local_name, e.to_string()))?;
            let mut last = f64::NAN;
            for &close in &history.close {
                last = atr.next(close);
            }
            out.insert("atr".to_string(), nan_or(last));
        }
    }

    Ok(out)
}

struct Registration {
    local_name: String,
    kind: IndicatorType,
    parameters: serde_json::Value,
}

/// Holds every indicator a strategy registered during `init`, and recomputes
/// all of them, from scratch, against a shared history. Used identically by
/// the Strategy Worker and the Backtest Runner.
#[derive(Default)]
pub struct IndicatorBank {
    registrations: Vec<Registration>,
}

impl IndicatorRegistrar for IndicatorBank {
    fn add_indicator(
        &mut self,
        local_name: &str,
        indicator_type: &str,
        parameters: &serde_json::Value,
    ) -> Result<(), ConfigError> {
        let kind = IndicatorType::parse(indicator_type)?;
        validate(local_name, kind, parameters)?;
        self.registrations.push(Registration {
            local_name: local_name.to_string(),
            kind,
            parameters: parameters.clone(),
        });
        Ok(())
    }
}

impl IndicatorBank {
    pub fn recompute_all(&self, history: &Ohlcv) -> IndicatorValues {
        let mut values = IndicatorValues::new();
        for reg in &self.registrations {
            match recompute(&reg.local_name, reg.kind, &reg.parameters, history) {
                Ok(output) => {
                    values.insert(reg.local_name.clone(), output);
                }
                Err(e) => {
                    error!("indicator {} failed to recompute: {e}", reg.local_name);
                }
            }
        }
        values
    }
}

/// A deterministic 100-point synthetic OHLCV series, used to validate that a
/// parameter set is acceptable to the indicator before a strategy is allowed
/// to deploy.
fn synthetic_history() -> Ohlcv {
    let mut history = Ohlcv::default();
    for i in 0..100 {
        let base = 100.0 + (i as f64 * 0.1).sin() * 5.0 + i as f64 * 0.05;
        history.open.push(base);
        history.high.push(base + 0.5);
        history.low.push(base - 0.5);
        history.close.push(base + 0.1);
        history.volume.push(1_000.0);
    }
    history
}

/// Validates that `kind`/`parameters` can be constructed and can process a
/// synthetic 100-point history without error. Called once from
/// `add_indicator` before a strategy is allowed to register it.
pub fn validate(local_name: &str, kind: IndicatorType, parameters: &serde_json::Value) -> Result<(), ConfigError> {
    recompute(local_name, kind, parameters, &synthetic_history()).map(|_| ())
}
