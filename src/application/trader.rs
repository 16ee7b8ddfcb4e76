//! Trader: consumes tagged advice, enforces per-deployment sequencing and
//! cycle-count invariants, places/settles offers against the exchange
//! adapter, and records executed trades. Advice processing is offloaded to
//! a worker pool; the Trader loop itself is a thin scheduler that submits
//! work and periodically reaps completed futures.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::errors::ExchangeError;
use crate::domain::ports::{EffectKind, ExchangeAdapter, TransactionBuilder};
use crate::domain::repositories::TradeRecordRepository;
use crate::domain::trading::{Advice, SequenceDecision, TradeAdvice, TradeContext, TradeContextMap, TradeOwner, TradeRecord};

use crate::application::engine::EngineCommand;

const REAP_INTERVAL: Duration = Duration::from_secs(5);

/// Outcome of processing one piece of advice, reaped from the worker pool
/// and converted into an engine command where relevant.
enum TradeOutcome {
    /// Proceeded normally, or was a no-op (duplicate advice).
    Handled,
    Done(Uuid),
    Error(Uuid, String),
}

pub struct TraderConfig {
    pub trading_account: String,
    pub signers: Vec<String>,
}

pub async fn run(
    mut advice_rx: Receiver<TradeAdvice>,
    exchange: Arc<dyn ExchangeAdapter>,
    trade_records: Arc<dyn TradeRecordRepository>,
    contexts: Arc<TradeContextMap>,
    config: Arc<TraderConfig>,
    engine_cmd_tx: Sender<EngineCommand>,
) {
    let mut pool: JoinSet<TradeOutcome> = JoinSet::new();
    let mut reap_interval = tokio::time::interval(REAP_INTERVAL);

    loop {
        tokio::select! {
            advice = advice_rx.recv() => {
                let Some(advice) = advice else {
                    break;
                };
                let exchange = exchange.clone();
                let trade_records = trade_records.clone();
                let contexts = contexts.clone();
                let config = config.clone();
                pool.spawn(async move {
                    handle_advice(advice, exchange, trade_records, contexts, config).await
                });
            }
            _ = reap_interval.tick() => {
                reap(&mut pool, &engine_cmd_tx).await;
            }
        }
    }

    // Drain whatever is still in flight once the advice bus closes.
    reap(&mut pool, &engine_cmd_tx).await;
}

async fn reap(pool: &mut JoinSet<TradeOutcome>, engine_cmd_tx: &Sender<EngineCommand>) {
    while let Some(result) = pool.try_join_next() {
        match result {
            Ok(TradeOutcome::Handled) => {}
            Ok(TradeOutcome::Done(did)) => {
                let _ = engine_cmd_tx.send(EngineCommand::Done(did)).await;
            }
            Ok(TradeOutcome::Error(did, reason)) => {
                let _ = engine_cmd_tx.send(EngineCommand::Stop(did, reason)).await;
            }
            Err(join_error) => {
                error!("trader: worker task panicked: {join_error}");
            }
        }
    }
}

async fn handle_advice(
    advice: TradeAdvice,
    exchange: Arc<dyn ExchangeAdapter>,
    trade_records: Arc<dyn TradeRecordRepository>,
    contexts: Arc<TradeContextMap>,
    config: Arc<TraderConfig>,
) -> TradeOutcome {
    let did = advice.deployment_id;

    // 1. Context acquisition/creation. A fresh context always proceeds: it
    // is opened by the advice that created it, so running that same advice
    // back through `sequence` would misread it as a duplicate of itself.
    if advice.advice == Advice::Sell && contexts.get(did).await.is_none() {
        warn!(deployment_id = %did, "sell without prior buy");
        return TradeOutcome::Handled;
    }
    let just_opened = std::cell::Cell::new(false);
    let ctx_handle = contexts
        .get_or_insert_with(did, || {
            just_opened.set(true);
            TradeContext::opening(advice.advice, advice.amount)
        })
        .await;

    // 2. Sequencing and cycle check.
    let decision = if just_opened.get() {
        SequenceDecision::Proceed
    } else {
        let mut ctx = ctx_handle.lock().await;
        ctx.sequence(advice.advice, advice.num_cycles)
    };

    match decision {
        SequenceDecision::Continue => return TradeOutcome::Handled,
        SequenceDecision::Done => {
            contexts.remove(did).await;
            return TradeOutcome::Done(did);
        }
        SequenceDecision::Proceed => {}
    }

    // 3. Offer placement.
    let (selling, buying, place_amount) = {
        let ctx = ctx_handle.lock().await;
        match advice.advice {
            Advice::Buy => (advice.pair.base.clone(), advice.pair.counter.clone(), ctx.buy_amount),
            Advice::Sell => (advice.pair.counter.clone(), advice.pair.base.clone(), ctx.sell_amount),
        }
    };

    if place_amount <= Decimal::ZERO {
        return TradeOutcome::Error(did, "ran out of fund".to_string());
    }

    let orderbook = match exchange.fetch_orderbook(&selling, &buying).await {
        Ok(book) => book,
        Err(e) => return TradeOutcome::Error(did, e.to_string()),
    };
    let Some(top_bid) = orderbook.top_bid() else {
        return TradeOutcome::Error(
            did,
            ExchangeError::EmptyOrderbook {
                selling: selling.to_string(),
                buying: buying.to_string(),
            }
            .to_string(),
        );
    };

    let mut builder = TransactionBuilder::new(config.trading_account.clone(), config.signers.clone());
    builder.add_offer(place_amount, selling.clone(), buying.clone(), top_bid.price);

    let submission = match exchange.submit(builder).await {
        Ok(result) => result,
        Err(e) => return TradeOutcome::Error(did, e.to_string()),
    };
    if !submission.is_success {
        return TradeOutcome::Error(did, submission.errors.join("; "));
    }

    // 4. Settlement: cancel any residue, then total sold/bought from effects.
    for offer in exchange
        .account_offers(&config.trading_account)
        .await
        .unwrap_or_default()
    {
        if offer.selling == selling && offer.buying == buying {
            let mut cancel = TransactionBuilder::new(config.trading_account.clone(), config.signers.clone());
            cancel.remove_offer(offer.offer_id, offer.selling, offer.buying);
            let _ = exchange.submit(cancel).await;
        }
    }

    let effects = match exchange.transaction_effects(&submission.transaction_id).await {
        Ok(effects) => effects,
        Err(e) => return TradeOutcome::Error(did, e.to_string()),
    };

    let mut total_sold = Decimal::ZERO;
    let mut total_bought = Decimal::ZERO;
    for effect in &effects {
        if effect.kind == EffectKind::Trade && effect.account == config.trading_account {
            total_sold += effect.sold_amount;
            total_bought += effect.bought_amount;
        }
    }

    {
        let mut ctx = ctx_handle.lock().await;
        match advice.advice {
            Advice::Buy => {
                ctx.buy_amount -= total_sold;
                ctx.sell_amount += total_bought;
            }
            Advice::Sell => {
                ctx.sell_amount -= total_sold;
                ctx.buy_amount += total_bought;
            }
        }
    }

    // 5. Record the trade.
    let record = TradeRecord {
        timestamp: chrono::Utc::now(),
        owner: TradeOwner::Deployment(did),
        advice: advice.advice,
        sold_asset: selling.key(),
        sold_amount: total_sold,
        bought_asset: buying.key(),
        bought_amount: total_bought,
    };
    if let Err(e) = trade_records.save(&record).await {
        error!(deployment_id = %did, "failed to persist trade record: {e}");
    } else {
        info!(deployment_id = %did, %total_sold, %total_bought, "trade settled");
    }

    TradeOutcome::Handled
}
