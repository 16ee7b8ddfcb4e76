//! Historical Candle Store Query Layer: given a pair, time window, and
//! resolution, returns a paged ordered stream of candles, re-aggregating
//! 1-minute rows on the fly for coarser resolutions.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::errors::PersistenceError;
use crate::domain::market::candle::Candle;
use crate::domain::market::resolution::Resolution;
use crate::domain::market::asset::TradingPair;
use crate::domain::repositories::CandleRepository;

pub struct CandlePage {
    pub candles: Vec<Candle>,
    pub next_page_token: Option<i64>,
}

/// Raw-row chunk size used internally to scan for bucket boundaries when
/// `resolution` is coarser than 1 minute. Not exposed to callers: `page_size`
/// bounds the number of *aggregated* candles returned, not raw rows.
const RAW_SCAN_CHUNK: usize = 500;

/// Fetches a page of at most `page_size` candles at `resolution`, starting
/// just after `page_token`.
///
/// For `OneMin`, `page_size` bounds the raw row fetch directly. For any
/// coarser resolution, `page_size` bounds the number of re-aggregated
/// candles instead: a bucket is never split across a raw-row page boundary,
/// because a bucket is only finalized once a later raw row (in a different
/// bucket, or past the window) proves it closed.
pub async fn get_candles(
    candles: &Arc<dyn CandleRepository>,
    pair: &TradingPair,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    resolution: Resolution,
    page_size: usize,
    page_token: Option<i64>,
) -> Result<CandlePage, PersistenceError> {
    if resolution == Resolution::OneMin {
        let rows = candles
            .find_minute_page(pair, start, end, page_token.unwrap_or(0), page_size)
            .await?;
        let next_page_token = rows.last().map(|(id, _)| *id);
        return Ok(CandlePage {
            candles: rows.into_iter().map(|(_, c)| c).collect(),
            next_page_token,
        });
    }

    let mut cursor = page_token.unwrap_or(0);
    let mut aggregated: Vec<Candle> = Vec::new();
    let mut bucket_last_row_id: Vec<i64> = Vec::new();

    loop {
        let rows = candles.find_minute_page(pair, start, end, cursor, RAW_SCAN_CHUNK).await?;
        if rows.is_empty() {
            break;
        }
        for (id, row) in rows {
            cursor = id;
            match aggregated.last_mut() {
                Some(last) if resolution.same_bucket(last.start, row.start) => {
                    last.merge(&row);
                    *bucket_last_row_id.last_mut().unwrap() = id;
                }
                _ => {
                    aggregated.push(row);
                    bucket_last_row_id.push(id);
                }
            }
        }
        if aggregated.len() > page_size {
            break;
        }
    }

    // The window is exhausted with <= page_size buckets: nothing left in
    // [start, end] can merge into the last one, so it's closed too. Only
    // when scanning stopped because we overshot page_size is the extra
    // bucket held back to the next page.
    let closed_count = aggregated.len().min(page_size);
    let next_page_token = bucket_last_row_id.get(closed_count.wrapping_sub(1)).copied();
    aggregated.truncate(closed_count);

    Ok(CandlePage {
        candles: aggregated,
        next_page_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::asset::Asset;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn pair() -> TradingPair {
        TradingPair::new(Asset::Native, Asset::issued("USD", "IssuerA"))
    }

    fn minute(id: i64, minute: u32, close: rust_decimal::Decimal) -> (i64, Candle) {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, 0).unwrap();
        let mut c = Candle::open_with(pair(), start, close, dec!(1), dec!(1));
        c.close = close;
        (id, c)
    }

    struct FixedRows(Vec<(i64, Candle)>);

    #[async_trait]
    impl CandleRepository for FixedRows {
        async fn save(&self, _candle: &Candle, _resolution: Resolution) -> Result<(), PersistenceError> {
            Ok(())
        }

        async fn find_range(
            &self,
            _pair: &TradingPair,
            _resolution: Resolution,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<Candle>, PersistenceError> {
            Ok(self.0.iter().map(|(_, c)| c.clone()).collect())
        }

        async fn find_minute_page(
            &self,
            _pair: &TradingPair,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            after_row_id: i64,
            limit: usize,
        ) -> Result<Vec<(i64, Candle)>, PersistenceError> {
            Ok(self
                .0
                .iter()
                .filter(|(id, _)| *id > after_row_id)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    #[tokio::test]
    async fn reaggregates_minute_rows_into_the_requested_resolution() {
        let rows = vec![
            minute(1, 0, dec!(1)),
            minute(2, 1, dec!(2)),
            minute(3, 4, dec!(3)),
            minute(4, 5, dec!(4)),
        ];
        let repo: Arc<dyn CandleRepository> = Arc::new(FixedRows(rows));
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap();

        let page = get_candles(&repo, &pair(), start, end, Resolution::FiveMin, 100, None)
            .await
            .unwrap();

        assert_eq!(page.candles.len(), 1);
        assert_eq!(page.candles[0].close, dec!(4));
        assert_eq!(page.next_page_token, Some(4));
    }

    #[tokio::test]
    async fn one_minute_resolution_returns_raw_rows_unchanged() {
        let rows = vec![minute(1, 0, dec!(1)), minute(2, 1, dec!(2))];
        let repo: Arc<dyn CandleRepository> = Arc::new(FixedRows(rows));
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap();

        let page = get_candles(&repo, &pair(), start, end, Resolution::OneMin, 100, None)
            .await
            .unwrap();

        assert_eq!(page.candles.len(), 2);
    }

    #[tokio::test]
    async fn coarse_resolution_page_size_bounds_aggregated_candles_not_raw_rows() {
        // three five-minute buckets, five raw rows each; page_size=1 means
        // "one aggregated candle per page", not "one raw row per page".
        let mut rows = Vec::new();
        let mut id: i64 = 1;
        for bucket in 0..3u32 {
            for offset in 0..5u32 {
                let minute_of_hour = bucket * 5 + offset;
                rows.push(minute(id, minute_of_hour, dec!(1)));
                id += 1;
            }
        }
        let repo: Arc<dyn CandleRepository> = Arc::new(FixedRows(rows));
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 1, 1, 0, 0).unwrap();

        let first = get_candles(&repo, &pair(), start, end, Resolution::FiveMin, 1, None)
            .await
            .unwrap();
        assert_eq!(first.candles.len(), 1, "a bucket must not be split across a raw-row page boundary");
        assert_eq!(first.next_page_token, Some(5));

        let second = get_candles(&repo, &pair(), start, end, Resolution::FiveMin, 1, first.next_page_token)
            .await
            .unwrap();
        assert_eq!(second.candles.len(), 1);
        assert_eq!(second.next_page_token, Some(10));

        let third = get_candles(&repo, &pair(), start, end, Resolution::FiveMin, 1, second.next_page_token)
            .await
            .unwrap();
        assert_eq!(third.candles.len(), 1);
        assert_eq!(third.next_page_token, Some(15));

        let fourth = get_candles(&repo, &pair(), start, end, Resolution::FiveMin, 1, third.next_page_token)
            .await
            .unwrap();
        assert!(fourth.candles.is_empty(), "the window is exhausted after three buckets");
    }
}
