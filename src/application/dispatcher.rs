//! Advice Dispatcher: a thin shim, one per deployment, that tags raw advice
//! from a Strategy Worker with its deployment context before forwarding it
//! onto the global advice bus. Exists so strategies stay oblivious to
//! deployment identity.

use rust_decimal::Decimal;
use tokio::sync::mpsc::{Receiver, Sender};
use uuid::Uuid;

use crate::domain::market::asset::TradingPair;
use crate::domain::trading::{Advice, TradeAdvice};

pub struct DispatcherContext {
    pub deployment_id: Uuid,
    pub owner: String,
    pub pair: TradingPair,
    pub amount: Decimal,
    pub num_cycles: u32,
}

/// Consumes raw advice from a Strategy Worker and forwards tagged
/// [`TradeAdvice`] onto the shared advice bus. Returns when either end
/// closes.
pub async fn run(ctx: DispatcherContext, mut raw_advice_rx: Receiver<Advice>, advice_bus: Sender<TradeAdvice>) {
    while let Some(advice) = raw_advice_rx.recv().await {
        let tagged = TradeAdvice {
            deployment_id: ctx.deployment_id,
            user_id: ctx.owner.clone(),
            pair: ctx.pair.clone(),
            advice,
            amount: ctx.amount,
            num_cycles: ctx.num_cycles,
        };
        if advice_bus.send(tagged).await.is_err() {
            return;
        }
    }
}
