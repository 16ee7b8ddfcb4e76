//! Strategy Worker: one instance per deployment. Maintains the rolling
//! OHLCV history and indicator registry, drives the strategy callback
//! contract, and emits raw buy/sell advice.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::warn;
use uuid::Uuid;

use crate::application::indicators::IndicatorBank;
use crate::domain::errors::ConfigError;
use crate::domain::market::candle::Candle;
use crate::domain::strategy::{Ohlcv, TradingStrategy};
use crate::domain::trading::Advice;

const ITERATION_DELAY: Duration = Duration::from_secs(1);

pub struct StrategyWorker {
    deployment_id: Uuid,
    strategy: Box<dyn TradingStrategy>,
    indicators: IndicatorBank,
    history: Ohlcv,
    last_processed_start: Option<DateTime<Utc>>,
}

impl StrategyWorker {
    /// Setup + init. Returns `Err` (a configuration-time failure) if the
    /// strategy's `init` hook registers an invalid indicator; the caller
    /// (Engine Controller) transitions the deployment to ERROR in that case
    /// without ever spawning the run loop.
    pub fn new(deployment_id: Uuid, mut strategy: Box<dyn TradingStrategy>) -> Result<Self, ConfigError> {
        let mut indicators = IndicatorBank::default();
        strategy.init(&mut indicators)?;
        Ok(Self {
            deployment_id,
            strategy,
            indicators,
            history: Ohlcv::default(),
            last_processed_start: None,
        })
    }

    /// Consumes `candle_rx` forever, emitting advice on `advice_tx`. Returns
    /// when `candle_rx` closes (the Engine Controller dropped the sink as
    /// part of UNDEPLOY/DONE/STOP teardown).
    pub async fn run(mut self, mut candle_rx: Receiver<Candle>, advice_tx: Sender<Advice>) {
        while let Some(candle) = candle_rx.recv().await {
            let is_new = match self.last_processed_start {
                None => true,
                Some(last) => candle.start > last,
            };

            if is_new {
                self.history.push_candle(&candle);
                self.last_processed_start = Some(candle.start);
                let indicator_values = self.indicators.recompute_all(&self.history);

                let strategy = AssertUnwindSafe(&mut self.strategy);
                let process_result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    strategy.0.process_candle(&candle);
                }));
                if let Err(panic) = process_result {
                    warn!(deployment_id = %self.deployment_id, "process_candle panicked: {panic:?}");
                    continue;
                }

                let execute_result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                    self.strategy.execute(&indicator_values)
                }));

                match execute_result {
                    Ok(Some(advice)) => {
                        if advice_tx.send(advice).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(panic) => {
                        warn!(deployment_id = %self.deployment_id, "execute panicked: {panic:?}");
                    }
                }
            }

            tokio::time::sleep(ITERATION_DELAY).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::strategies::dummy::DummyStrategy;
    use crate::domain::market::asset::{Asset, TradingPair};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    fn candle(minute: u32) -> Candle {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, 0).unwrap();
        let pair = TradingPair::new(Asset::Native, Asset::issued("USD", "IssuerA"));
        Candle::open_with(pair, start, dec!(1), dec!(1), dec!(1))
    }

    #[tokio::test]
    async fn ignores_a_candle_that_is_not_newer_than_the_last_processed_one() {
        let strategy = Box::new(DummyStrategy::new(&serde_json::json!({})));
        let worker = StrategyWorker::new(Uuid::new_v4(), strategy).unwrap();

        let (candle_tx, candle_rx) = mpsc::channel(8);
        let (advice_tx, mut advice_rx) = mpsc::channel(8);

        let handle = tokio::spawn(async move {
            // replace the default 1s iteration delay's effect on test time by
            // abort()-ing the worker once we've observed what we need.
            worker.run(candle_rx, advice_tx).await;
        });

        candle_tx.send(candle(0)).await.unwrap();
        candle_tx.send(candle(0)).await.unwrap();
        drop(candle_tx);

        assert!(tokio::time::timeout(Duration::from_millis(100), advice_rx.recv())
            .await
            .is_err());
        handle.abort();
    }
}
