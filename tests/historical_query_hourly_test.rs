//! Sixty persisted 1-minute candles spanning one hour re-aggregate, through
//! the real SQLite-backed candle store, into a single hourly row whose open
//! is the first minute's open, close is the last minute's close, and
//! high/low/volume fold across the whole hour.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use stardust_engine::application::historical_query;
use stardust_engine::domain::market::asset::{Asset, TradingPair};
use stardust_engine::domain::market::{Candle, Resolution};
use stardust_engine::domain::repositories::CandleRepository;
use stardust_engine::infrastructure::persistence::{Database, SqliteCandleRepository};

fn pair() -> TradingPair {
    TradingPair::new(Asset::Native, Asset::issued("USD", "IssuerA"))
}

fn minute_candle(minute: u32, open: Decimal, high: Decimal, low: Decimal, close: Decimal, volume: Decimal) -> Candle {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, 0).unwrap();
    Candle {
        pair: pair(),
        start,
        open,
        high,
        low,
        close,
        base_volume: volume,
        counter_volume: volume,
    }
}

#[tokio::test]
async fn sixty_one_minute_candles_fold_into_one_hourly_row() {
    let db = Database::main("sqlite::memory:").await.unwrap();
    let candles: Arc<dyn CandleRepository> = Arc::new(SqliteCandleRepository::new(db.pool.clone()));

    let mut expected_open = Decimal::ZERO;
    let mut expected_close = Decimal::ZERO;
    let mut expected_high = Decimal::MIN;
    let mut expected_low = Decimal::MAX;
    let mut expected_volume = Decimal::ZERO;

    for minute in 0..60u32 {
        // a gentle sawtooth so high/low aren't trivially the first/last minute
        let base = dec!(1.0) + Decimal::new(minute as i64, 3);
        let open = base;
        let close = base + dec!(0.001);
        let high = base + dec!(0.02);
        let low = base - dec!(0.005);
        let volume = dec!(10) + Decimal::new(minute as i64, 0);

        if minute == 0 {
            expected_open = open;
        }
        if minute == 59 {
            expected_close = close;
        }
        expected_high = expected_high.max(high);
        expected_low = expected_low.min(low);
        expected_volume += volume;

        candles
            .save(&minute_candle(minute, open, high, low, close, volume), Resolution::OneMin)
            .await
            .unwrap();
    }

    let window_start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let window_end = Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap();

    let page = historical_query::get_candles(&candles, &pair(), window_start, window_end, Resolution::OneHour, 200, None)
        .await
        .unwrap();

    assert_eq!(page.candles.len(), 1);
    let hourly = &page.candles[0];
    assert_eq!(hourly.open, expected_open);
    assert_eq!(hourly.close, expected_close);
    assert_eq!(hourly.high, expected_high);
    assert_eq!(hourly.low, expected_low);
    assert_eq!(hourly.base_volume, expected_volume);
}
