//! Candle Aggregator: polls the exchange adapter for new trades and folds
//! them into a monotone stream of closed 1-minute candles, one per (pair,
//! minute) actually traded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::Sender;
use tracing::{error, info, warn};

use crate::domain::market::candle::Candle;
use crate::domain::ports::ExchangeAdapter;
use crate::domain::repositories::StateRepository;

const LAST_HANDLED_TRADE_KEY: &str = "LAST_HANDLED_TRADE";

pub struct FetcherConfig {
    pub poll_interval: Duration,
    pub page_size: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            page_size: 200,
        }
    }
}

/// Runs the fetcher's perpetual poll loop, emitting closed candles on
/// `sink`. Exits only if the sink is dropped.
pub async fn run(
    exchange: Arc<dyn ExchangeAdapter>,
    state: Arc<dyn StateRepository>,
    config: FetcherConfig,
    sink: Sender<Candle>,
) {
    let mut cursor = match state.get(LAST_HANDLED_TRADE_KEY).await {
        Ok(Some(cursor)) => cursor,
        Ok(None) => match exchange.last_trade_cursor().await {
            Ok(cursor) => cursor,
            Err(e) => {
                error!("fetcher: failed to seed cursor from exchange tail: {e}");
                String::new()
            }
        },
        Err(e) => {
            error!("fetcher: failed to load saved cursor, starting from exchange tail: {e}");
            exchange.last_trade_cursor().await.unwrap_or_default()
        }
    };

    let mut in_progress: HashMap<String, Candle> = HashMap::new();

    loop {
        tokio::time::sleep(config.poll_interval).await;

        let rows = match exchange.fetch_trades(&cursor, config.page_size).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("fetcher: trade fetch failed, retrying next tick: {e}");
                continue;
            }
        };

        for row in rows {
            let key = row.pair.key();
            let price = row.price();

            match in_progress.get_mut(&key) {
                None => {
                    in_progress.insert(
                        key,
                        Candle::open_with(
                            row.pair.clone(),
                            row.ledger_close_time,
                            price,
                            row.base_amount,
                            row.counter_amount,
                        ),
                    );
                }
                Some(candle) => {
                    if crate::domain::market::resolution::Resolution::OneMin
                        .same_bucket(candle.start, row.ledger_close_time)
                    {
                        candle.update(price, row.base_amount, row.counter_amount);
                    } else {
                        let closed = candle.clone();
                        *candle = Candle::open_with(
                            row.pair.clone(),
                            row.ledger_close_time,
                            price,
                            row.base_amount,
                            row.counter_amount,
                        );
                        if sink.send(closed).await.is_err() {
                            info!("fetcher: sink closed, stopping");
                            return;
                        }
                    }
                }
            }

            cursor = row.paging_token;
        }

        if let Err(e) = state.set(LAST_HANDLED_TRADE_KEY, &cursor).await {
            warn!("fetcher: failed to persist cursor: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{ExchangeError, PersistenceError};
    use crate::domain::market::asset::{Asset, TradingPair};
    use crate::domain::ports::{
        Bid, OpenOffer, Orderbook, TradeRow, TransactionBuilder, TransactionEffect,
        TransactionResult,
    };
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct ScriptedExchange {
        pages: Mutex<Vec<Vec<TradeRow>>>,
    }

    #[async_trait]
    impl ExchangeAdapter for ScriptedExchange {
        async fn last_trade_cursor(&self) -> Result<String, ExchangeError> {
            Ok("0".to_string())
        }

        async fn fetch_trades(&self, _cursor: &str, _limit: usize) -> Result<Vec<TradeRow>, ExchangeError> {
            Ok(self.pages.lock().unwrap().pop().unwrap_or_default())
        }

        async fn fetch_orderbook(&self, _selling: &Asset, _buying: &Asset) -> Result<Orderbook, ExchangeError> {
            unimplemented!()
        }

        async fn submit(&self, _builder: TransactionBuilder) -> Result<TransactionResult, ExchangeError> {
            unimplemented!()
        }

        async fn transaction_effects(&self, _transaction_id: &str) -> Result<Vec<TransactionEffect>, ExchangeError> {
            unimplemented!()
        }

        async fn account_offers(&self, _account: &str) -> Result<Vec<OpenOffer>, ExchangeError> {
            unimplemented!()
        }
    }

    struct NullState;
    #[async_trait]
    impl StateRepository for NullState {
        async fn get(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    fn pair() -> TradingPair {
        TradingPair::new(Asset::Native, Asset::issued("USD", "IssuerA"))
    }

    fn row(minute: u32, second: u32, price: (i64, i64), base: &str) -> TradeRow {
        TradeRow {
            pair: pair(),
            price_n: price.0,
            price_d: price.1,
            base_amount: base.parse().unwrap(),
            counter_amount: dec!(1),
            ledger_close_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, second).unwrap(),
            paging_token: format!("{minute}{second}"),
        }
    }

    #[tokio::test]
    async fn emits_a_closed_candle_only_once_the_minute_rolls_over() {
        // pages are popped in reverse order, so push the last page first
        let pages = vec![
            vec![row(1, 0, (12, 100), "1")],
            vec![row(0, 0, (10, 100), "1"), row(0, 30, (11, 100), "1")],
        ];
        let exchange = Arc::new(ScriptedExchange {
            pages: Mutex::new(pages),
        });
        let state = Arc::new(NullState);
        let (tx, mut rx) = mpsc::channel(8);

        let config = FetcherConfig {
            poll_interval: Duration::from_millis(1),
            page_size: 10,
        };

        let handle = tokio::spawn(run(exchange, state, config, tx));

        let closed = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("candle should close before the timeout")
            .expect("sink should not be closed");

        assert_eq!(closed.open, dec!(0.10));
        assert_eq!(closed.close, dec!(0.11));
        handle.abort();
    }
}
