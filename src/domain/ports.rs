//! The exchange adapter port: everything the Trader and Candle Aggregator
//! need from the venue. A single mock implementation
//! (`infrastructure::mock_exchange::MockExchangeAdapter`) backs tests and
//! local runs; no real Horizon/Stellar client is built.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::errors::ExchangeError;
use crate::domain::market::asset::{Asset, TradingPair};

/// A single executed trade on a trading pair, as reported by the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRow {
    pub pair: TradingPair,
    pub price_n: i64,
    pub price_d: i64,
    pub base_amount: Decimal,
    pub counter_amount: Decimal,
    pub ledger_close_time: DateTime<Utc>,
    pub paging_token: String,
}

impl TradeRow {
    pub fn price(&self) -> Decimal {
        Decimal::from(self.price_n) / Decimal::from(self.price_d)
    }
}

/// One resting bid on the order book, best (highest) first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bid {
    pub amount: Decimal,
    pub price: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct Orderbook {
    pub bids: Vec<Bid>,
}

impl Orderbook {
    pub fn top_bid(&self) -> Option<Bid> {
        self.bids.first().copied()
    }
}

/// One leg of a submitted transaction's effects: a trade that moved funds in
/// or out of the trading account.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionEffect {
    pub kind: EffectKind,
    pub account: String,
    pub sold_amount: Decimal,
    pub bought_amount: Decimal,
    pub offer_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Trade,
    Other,
}

#[derive(Debug, Clone)]
pub struct TransactionResult {
    pub transaction_id: String,
    pub is_success: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OpenOffer {
    pub offer_id: String,
    pub selling: Asset,
    pub buying: Asset,
    pub amount: Decimal,
    pub price: Decimal,
}

/// Operation queued against a [`TransactionBuilder`], mirroring the
/// `add_offer`/`remove_offer` calls the original scoped builder accumulated
/// before submitting on scope exit.
#[derive(Debug, Clone)]
pub enum TransactionOp {
    AddOffer {
        amount: Decimal,
        selling: Asset,
        buying: Asset,
        price: Decimal,
    },
    RemoveOffer {
        offer_id: String,
        selling: Asset,
        buying: Asset,
    },
}

/// Accumulates operations for one transaction. Replaces the original's `with
/// new_transaction(...) as trx:` scoped builder: operations are queued with
/// `add_offer`/`remove_offer`, and `submit` performs the work the `__exit__`
/// hook performed implicitly.
#[derive(Debug, Clone, Default)]
pub struct TransactionBuilder {
    pub account: String,
    pub signers: Vec<String>,
    pub ops: Vec<TransactionOp>,
}

impl TransactionBuilder {
    pub fn new(account: impl Into<String>, signers: Vec<String>) -> Self {
        Self {
            account: account.into(),
            signers,
            ops: Vec::new(),
        }
    }

    pub fn add_offer(&mut self, amount: Decimal, selling: Asset, buying: Asset, price: Decimal) {
        self.ops.push(TransactionOp::AddOffer {
            amount,
            selling,
            buying,
            price,
        });
    }

    pub fn remove_offer(&mut self, offer_id: impl Into<String>, selling: Asset, buying: Asset) {
        self.ops.push(TransactionOp::RemoveOffer {
            offer_id: offer_id.into(),
            selling,
            buying,
        });
    }
}

#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Paging token of the newest trade on the ledger, used by the fetcher
    /// to resume a cursor after a restart.
    async fn last_trade_cursor(&self) -> Result<String, ExchangeError>;

    /// Ordered trade records starting just after `cursor`, at most `limit`.
    async fn fetch_trades(&self, cursor: &str, limit: usize) -> Result<Vec<TradeRow>, ExchangeError>;

    async fn fetch_orderbook(&self, selling: &Asset, buying: &Asset) -> Result<Orderbook, ExchangeError>;

    /// Submits a built transaction and returns its result.
    async fn submit(&self, builder: TransactionBuilder) -> Result<TransactionResult, ExchangeError>;

    async fn transaction_effects(
        &self,
        transaction_id: &str,
    ) -> Result<Vec<TransactionEffect>, ExchangeError>;

    async fn account_offers(&self, account: &str) -> Result<Vec<OpenOffer>, ExchangeError>;
}
