use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::advice::Advice;

/// In-memory per-deployment trading state. Created on the first BUY advice
/// for a deployment, updated by the Trader, discarded when the deployment
/// terminates.
#[derive(Debug, Clone)]
pub struct TradeContext {
    pub first_advice: Advice,
    pub last_advice: Advice,
    pub current_cycles: u32,
    pub buy_amount: Decimal,
    pub sell_amount: Decimal,
}

impl TradeContext {
    pub fn opening(advice: Advice, amount: Decimal) -> Self {
        Self {
            first_advice: advice,
            last_advice: advice,
            current_cycles: 0,
            buy_amount: amount,
            sell_amount: Decimal::ZERO,
        }
    }
}

/// Outcome of the sequencing/cycle check the Trader (and, in a reduced form,
/// the Backtest Runner) performs before attempting to place an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceDecision {
    /// Proceed with offer placement.
    Proceed,
    /// Duplicate consecutive advice, or SELL without a prior BUY: ignore.
    Continue,
    /// `current_cycles` has reached `num_cycles`: the deployment is done.
    Done,
}

impl TradeContext {
    /// Applies the Trader's sequencing and cycle-count rules (spec §4.6
    /// steps 1-2) to an incoming advice, mutating `last_advice`/
    /// `current_cycles` in place when the advice is accepted.
    pub fn sequence(&mut self, advice: Advice, num_cycles: u32) -> SequenceDecision {
        if self.current_cycles >= num_cycles {
            return SequenceDecision::Done;
        }
        if self.last_advice == advice {
            return SequenceDecision::Continue;
        }
        if advice != self.first_advice {
            self.current_cycles += 1;
        }
        self.last_advice = advice;
        SequenceDecision::Proceed
    }
}

/// Map of deployment id -> trade context, implementing the "array- or
/// map-of-mutex" pattern from the design notes: a short-held global mutex
/// guards the map structure (in particular check-and-insert), while each
/// context is independently locked for the duration of sequencing and
/// settlement updates.
#[derive(Default)]
pub struct TradeContextMap {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<TradeContext>>>>,
}

impl TradeContextMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, deployment_id: Uuid) -> Option<Arc<Mutex<TradeContext>>> {
        self.inner.lock().await.get(&deployment_id).cloned()
    }

    /// Check-and-insert: if a context already exists for `deployment_id` it
    /// is returned unchanged; otherwise `make` is called to build a fresh
    /// context, which is inserted and returned. The whole operation holds
    /// the global mutex only for the HashMap lookup/insert, not for any
    /// subsequent per-context work.
    pub async fn get_or_insert_with(
        &self,
        deployment_id: Uuid,
        make: impl FnOnce() -> TradeContext,
    ) -> Arc<Mutex<TradeContext>> {
        let mut map = self.inner.lock().await;
        map.entry(deployment_id)
            .or_insert_with(|| Arc::new(Mutex::new(make())))
            .clone()
    }

    pub async fn remove(&self, deployment_id: Uuid) {
        self.inner.lock().await.remove(&deployment_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn scenario_3_cycle_bound_sequence() {
        let mut ctx = TradeContext::opening(Advice::Buy, dec!(100));
        let num_cycles = 2;

        // second BUY is a duplicate -> ignored
        assert_eq!(ctx.sequence(Advice::Buy, num_cycles), SequenceDecision::Continue);

        // SELL completes cycle 0 -> current_cycles becomes 1
        assert_eq!(ctx.sequence(Advice::Sell, num_cycles), SequenceDecision::Proceed);
        assert_eq!(ctx.current_cycles, 1);

        // BUY completes cycle 1 -> current_cycles becomes 2
        assert_eq!(ctx.sequence(Advice::Buy, num_cycles), SequenceDecision::Proceed);
        assert_eq!(ctx.current_cycles, 2);

        // SELL would be a third cycle, but current_cycles already == num_cycles
        assert_eq!(ctx.sequence(Advice::Sell, num_cycles), SequenceDecision::Done);
    }

    #[tokio::test]
    async fn get_or_insert_with_does_not_overwrite_existing_context() {
        let map = TradeContextMap::new();
        let did = Uuid::new_v4();

        let first = map
            .get_or_insert_with(did, || TradeContext::opening(Advice::Buy, dec!(10)))
            .await;
        let second = map
            .get_or_insert_with(did, || TradeContext::opening(Advice::Buy, dec!(999)))
            .await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().await.buy_amount, dec!(10));
    }
}
