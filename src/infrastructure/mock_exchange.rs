//! In-memory exchange adapter: keeps a ledger and a handful of seeded
//! orderbooks, enough to drive the Candle Aggregator and Trader in tests and
//! local runs without a real Horizon client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::domain::errors::ExchangeError;
use crate::domain::market::asset::Asset;
use crate::domain::ports::{
    Bid, EffectKind, ExchangeAdapter, OpenOffer, Orderbook, TradeRow, TransactionBuilder,
    TransactionEffect, TransactionOp, TransactionResult,
};

type AssetPair = (Asset, Asset);

#[derive(Default)]
struct State {
    trades: Vec<TradeRow>,
    orderbooks: HashMap<AssetPair, Orderbook>,
    offers: HashMap<String, Vec<OpenOffer>>,
    effects: HashMap<String, Vec<TransactionEffect>>,
}

/// An in-memory stand-in for the Stellar DEX. Trades and orderbooks are
/// seeded by the caller; submitted offers fill immediately against the
/// seeded book rather than resting.
pub struct MockExchangeAdapter {
    state: Mutex<State>,
    tx_counter: AtomicU64,
    offer_counter: AtomicU64,
}

impl MockExchangeAdapter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            tx_counter: AtomicU64::new(0),
            offer_counter: AtomicU64::new(0),
        }
    }

    pub async fn seed_trades(&self, trades: Vec<TradeRow>) {
        self.state.lock().await.trades = trades;
    }

    pub async fn seed_orderbook(&self, selling: Asset, buying: Asset, bids: Vec<Bid>) {
        self.state
            .lock()
            .await
            .orderbooks
            .insert((selling, buying), Orderbook { bids });
    }

    fn next_transaction_id(&self) -> String {
        format!("tx-{}", self.tx_counter.fetch_add(1, Ordering::Relaxed))
    }

    fn next_offer_id(&self) -> String {
        format!("offer-{}", self.offer_counter.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for MockExchangeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeAdapter for MockExchangeAdapter {
    async fn last_trade_cursor(&self) -> Result<String, ExchangeError> {
        let state = self.state.lock().await;
        Ok(state.trades.last().map(|t| t.paging_token.clone()).unwrap_or_default())
    }

    async fn fetch_trades(&self, cursor: &str, limit: usize) -> Result<Vec<TradeRow>, ExchangeError> {
        let state = self.state.lock().await;
        let start = match state.trades.iter().position(|t| t.paging_token == cursor) {
            Some(idx) => idx + 1,
            None => 0,
        };
        Ok(state.trades.iter().skip(start).take(limit).cloned().collect())
    }

    async fn fetch_orderbook(&self, selling: &Asset, buying: &Asset) -> Result<Orderbook, ExchangeError> {
        let state = self.state.lock().await;
        Ok(state
            .orderbooks
            .get(&(selling.clone(), buying.clone()))
            .cloned()
            .unwrap_or_default())
    }

    /// Fills `AddOffer` ops immediately against the seeded book at the
    /// offer's own price, up to the amount resting there; any unfilled
    /// remainder is parked as an open offer. `RemoveOffer` ops simply drop
    /// the matching parked offer.
    async fn submit(&self, builder: TransactionBuilder) -> Result<TransactionResult, ExchangeError> {
        let mut state = self.state.lock().await;
        let transaction_id = self.next_transaction_id();
        let mut effects = Vec::new();

        for op in builder.ops {
            match op {
                TransactionOp::AddOffer {
                    amount,
                    selling,
                    buying,
                    price,
                } => {
                    let book = state.orderbooks.entry((selling.clone(), buying.clone())).or_default();
                    let available: Decimal = book.bids.iter().map(|b| b.amount).sum();
                    let filled = amount.min(available);

                    let mut remaining_to_fill = filled;
                    for bid in book.bids.iter_mut() {
                        if remaining_to_fill <= Decimal::ZERO {
                            break;
                        }
                        let take = bid.amount.min(remaining_to_fill);
                        bid.amount -= take;
                        remaining_to_fill -= take;
                    }
                    book.bids.retain(|b| b.amount > Decimal::ZERO);

                    if filled > Decimal::ZERO {
                        effects.push(TransactionEffect {
                            kind: EffectKind::Trade,
                            account: builder.account.clone(),
                            sold_amount: filled,
                            bought_amount: filled * price,
                            offer_id: None,
                        });
                    }

                    let unfilled = amount - filled;
                    if unfilled > Decimal::ZERO {
                        let offer_id = self.next_offer_id();
                        state.offers.entry(builder.account.clone()).or_default().push(OpenOffer {
                            offer_id,
                            selling,
                            buying,
                            amount: unfilled,
                            price,
                        });
                    }
                }
                TransactionOp::RemoveOffer {
                    offer_id,
                    selling: _,
                    buying: _,
                } => {
                    if let Some(offers) = state.offers.get_mut(&builder.account) {
                        offers.retain(|o| o.offer_id != offer_id);
                    }
                }
            }
        }

        state.effects.insert(transaction_id.clone(), effects);
        Ok(TransactionResult {
            transaction_id,
            is_success: true,
            errors: Vec::new(),
        })
    }

    async fn transaction_effects(&self, transaction_id: &str) -> Result<Vec<TransactionEffect>, ExchangeError> {
        let state = self.state.lock().await;
        state
            .effects
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| ExchangeError::TransactionNotFound(transaction_id.to_string()))
    }

    async fn account_offers(&self, account: &str) -> Result<Vec<OpenOffer>, ExchangeError> {
        let state = self.state.lock().await;
        Ok(state.offers.get(account).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::asset::TradingPair;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn pair() -> TradingPair {
        TradingPair::new(Asset::Native, Asset::issued("USD", "IssuerA"))
    }

    #[tokio::test]
    async fn fully_filled_offer_reports_a_single_trade_effect_and_no_resting_offer() {
        let exchange = MockExchangeAdapter::new();
        exchange
            .seed_orderbook(Asset::Native, Asset::issued("USD", "IssuerA"), vec![Bid { amount: dec!(100), price: dec!(0.5) }])
            .await;

        let mut builder = TransactionBuilder::new("acct", vec![]);
        builder.add_offer(dec!(50), Asset::Native, Asset::issued("USD", "IssuerA"), dec!(0.5));
        let result = exchange.submit(builder).await.unwrap();
        assert!(result.is_success);

        let effects = exchange.transaction_effects(&result.transaction_id).await.unwrap();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].sold_amount, dec!(50));
        assert_eq!(effects[0].bought_amount, dec!(25));

        assert!(exchange.account_offers("acct").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partially_filled_offer_parks_the_remainder() {
        let exchange = MockExchangeAdapter::new();
        exchange
            .seed_orderbook(Asset::Native, Asset::issued("USD", "IssuerA"), vec![Bid { amount: dec!(10), price: dec!(0.5) }])
            .await;

        let mut builder = TransactionBuilder::new("acct", vec![]);
        builder.add_offer(dec!(50), Asset::Native, Asset::issued("USD", "IssuerA"), dec!(0.5));
        exchange.submit(builder).await.unwrap();

        let offers = exchange.account_offers("acct").await.unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].amount, dec!(40));
    }

    #[tokio::test]
    async fn fetch_trades_resumes_after_the_given_cursor() {
        let exchange = MockExchangeAdapter::new();
        let rows = vec![
            TradeRow {
                pair: pair(),
                price_n: 1,
                price_d: 2,
                base_amount: dec!(1),
                counter_amount: dec!(1),
                ledger_close_time: Utc::now(),
                paging_token: "1".to_string(),
            },
            TradeRow {
                pair: pair(),
                price_n: 1,
                price_d: 2,
                base_amount: dec!(1),
                counter_amount: dec!(1),
                ledger_close_time: Utc::now(),
                paging_token: "2".to_string(),
            },
        ];
        exchange.seed_trades(rows).await;

        let page = exchange.fetch_trades("1", 10).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].paging_token, "2");
    }

    #[tokio::test]
    async fn transaction_effects_for_unknown_id_is_an_error() {
        let exchange = MockExchangeAdapter::new();
        assert!(exchange.transaction_effects("bogus").await.is_err());
    }
}
