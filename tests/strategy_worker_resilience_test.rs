//! A strategy whose `execute` hook panics on exactly its fifth candle must
//! not take the worker down with it: the sixth candle is still processed
//! normally and advice still flows afterward.

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use uuid::Uuid;

use stardust_engine::application::strategy_worker::StrategyWorker;
use stardust_engine::domain::errors::ConfigError;
use stardust_engine::domain::market::asset::{Asset, TradingPair};
use stardust_engine::domain::market::Candle;
use stardust_engine::domain::strategy::{IndicatorRegistrar, IndicatorValues, TradingStrategy};
use stardust_engine::domain::trading::Advice;

struct PanicsOnFifthCandle {
    seen: u32,
}

impl TradingStrategy for PanicsOnFifthCandle {
    fn name(&self) -> &str {
        "panics-on-fifth"
    }

    fn init(&mut self, _registrar: &mut dyn IndicatorRegistrar) -> Result<(), ConfigError> {
        Ok(())
    }

    fn process_candle(&mut self, _candle: &Candle) {
        self.seen += 1;
    }

    fn execute(&mut self, _indicators: &IndicatorValues) -> Option<Advice> {
        if self.seen == 5 {
            panic!("synthetic strategy failure on the fifth candle");
        }
        if self.seen == 6 {
            return Some(Advice::Buy);
        }
        None
    }
}

fn pair() -> TradingPair {
    TradingPair::new(Asset::Native, Asset::issued("USD", "IssuerA"))
}

fn candle(minute: u32) -> Candle {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, 0).unwrap();
    Candle::open_with(pair(), start, dec!(1), dec!(1), dec!(1))
}

// The worker sleeps a fixed ITERATION_DELAY after every processed candle, so
// driving it through six candles costs real wall-clock time; the timeout
// below is sized generously above that floor rather than relying on paused
// virtual time, which the worker's plain `tokio::time::sleep` does not
// observe deterministically across a `recv().await` suspension point.
#[tokio::test]
async fn strategy_panic_is_contained_and_the_next_candle_still_advises() {
    let strategy: Box<dyn TradingStrategy> = Box::new(PanicsOnFifthCandle { seen: 0 });
    let worker = StrategyWorker::new(Uuid::new_v4(), strategy).unwrap();

    let (candle_tx, candle_rx) = mpsc::channel(8);
    let (advice_tx, mut advice_rx) = mpsc::channel(8);

    let handle = tokio::spawn(worker.run(candle_rx, advice_tx));

    for minute in 0..6u32 {
        candle_tx.send(candle(minute)).await.unwrap();
    }

    let advice = tokio::time::timeout(std::time::Duration::from_secs(10), advice_rx.recv())
        .await
        .expect("the sixth candle should still produce advice despite the fifth panicking")
        .expect("advice sink open");
    assert_eq!(advice, Advice::Buy);

    drop(candle_tx);
    handle.await.expect("worker task itself must not panic even though the strategy did");
}
