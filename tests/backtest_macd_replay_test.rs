//! Runs a full backtest request through the real Backtest Runner against a
//! synthetic sustained uptrend followed by a sustained downtrend, deployed
//! with the MACD strategy's default thresholds, and checks it settles into
//! FINISHED having recorded a BUY on the uptrend and a SELL on the reversal.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use stardust_engine::application::backtest_runner::{self, BacktestRunnerConfig};
use stardust_engine::domain::market::asset::{Asset, TradingPair};
use stardust_engine::domain::market::{Candle, Resolution};
use stardust_engine::domain::repositories::{BacktestRequestRepository, CandleRepository, TradeRecordRepository};
use stardust_engine::domain::trading::{Advice, Algo, BacktestRequest, BacktestStatus, TradeOwner};
use stardust_engine::infrastructure::persistence::{
    Database, SqliteBacktestRequestRepository, SqliteBacktestTradeRecordRepository, SqliteCandleRepository,
};

fn pair() -> TradingPair {
    TradingPair::new(Asset::Native, Asset::issued("USD", "IssuerA"))
}

fn minute_candle(minute: u32, close: Decimal) -> Candle {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, 0).unwrap();
    let mut c = Candle::open_with(pair(), start, close, dec!(1), dec!(1));
    c.high = close;
    c.low = close;
    c.close = close;
    c
}

#[tokio::test]
async fn sustained_trend_reversal_yields_a_buy_then_a_sell() {
    let candle_db = Database::main("sqlite::memory:").await.unwrap();
    let backtest_db = Database::backtest("sqlite::memory:").await.unwrap();

    let candles: Arc<dyn CandleRepository> = Arc::new(SqliteCandleRepository::new(candle_db.pool.clone()));
    let requests: Arc<dyn BacktestRequestRepository> =
        Arc::new(SqliteBacktestRequestRepository::new(backtest_db.pool.clone()));
    let trade_records: Arc<dyn TradeRecordRepository> =
        Arc::new(SqliteBacktestTradeRecordRepository::new(backtest_db.pool.clone()));

    // a steady climb for 40 minutes, then a sharp reversal for 20.
    for minute in 0..40u32 {
        let price = dec!(1.0) + Decimal::new(minute as i64, 2);
        candles.save(&minute_candle(minute, price), Resolution::OneMin).await.unwrap();
    }
    for minute in 40..60u32 {
        let steps_down = (minute - 39) as i64;
        let price = dec!(1.4) - Decimal::new(steps_down * 5, 2);
        candles.save(&minute_candle(minute, price), Resolution::OneMin).await.unwrap();
    }

    let bid = Uuid::new_v4();
    let request = BacktestRequest {
        id: bid,
        owner: "owner-1".to_string(),
        algo: Algo {
            name: "macd-demo".to_string(),
            owner: "owner-1".to_string(),
            pair: pair(),
            resolution: Resolution::OneMin,
            strategy_name: "macd".to_string(),
            strategy_parameters: serde_json::json!({}),
        },
        start_ts: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        end_ts: Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap(),
        status: BacktestStatus::New,
    };
    requests.save(&request).await.unwrap();

    let strategies = Arc::new(stardust_engine::application::strategies::default_registry());
    let handle = tokio::spawn(backtest_runner::run(
        requests.clone(),
        candles,
        trade_records.clone(),
        strategies,
        BacktestRunnerConfig {
            poll_interval: Duration::from_millis(5),
            page_size: 100,
        },
    ));

    let final_status = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let found = requests.find(bid).await.unwrap().unwrap();
            if found.status != BacktestStatus::New && found.status != BacktestStatus::Running {
                return found.status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("the backtest should finish before the timeout");

    assert_eq!(final_status, BacktestStatus::Finished);

    let trades = trade_records.find_by_owner(TradeOwner::Backtest(bid)).await.unwrap();
    assert!(!trades.is_empty(), "the sustained trend reversal should produce at least one trade");
    assert_eq!(trades[0].advice, Advice::Buy);
    if trades.len() > 1 {
        assert_eq!(trades[1].advice, Advice::Sell);
    }

    handle.abort();
}
