//! Resolution Fan-out: consumes the shared minute-candle stream and
//! re-aggregates it, per (pair, resolution) subscription, into the sinks the
//! Strategy Workers read from.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::info;
use uuid::Uuid;

use crate::domain::market::candle::Candle;
use crate::domain::market::resolution::Resolution;

/// One subscriber: a (pair key is implicit in the candle, resolution) pair
/// plus the sink to deliver re-aggregated candles to. `id` is stable for the
/// life of the subscription and must not be derived from its position in the
/// registry's Vec, since removing an earlier subscription shifts later ones.
pub struct Subscription {
    pub id: Uuid,
    pub resolution: Resolution,
    pub sink: Sender<Candle>,
}

/// Live (pair key) -> subscriptions map, shared with the Engine Controller so
/// deploy/undeploy can add and remove subscriptions while the fan-out loop
/// keeps running.
pub type FanoutRegistry = Arc<Mutex<HashMap<String, Vec<Subscription>>>>;

/// Runs the fan-out's perpetual consume loop against `source`, delivering to
/// every subscription registered for a pair under `registry`. Exits when
/// `source` closes.
pub async fn run(mut source: Receiver<Candle>, registry: FanoutRegistry) {
    let mut aggregates: HashMap<(String, Uuid), Candle> = HashMap::new();

    while let Some(minute_candle) = source.recv().await {
        let pair_key = minute_candle.pair.key();
        let mut registry = registry.lock().await;
        let Some(subs) = registry.get_mut(&pair_key) else {
            continue;
        };

        for sub in subs.iter_mut() {
            if sub.resolution == Resolution::OneMin {
                if sub.sink.send(minute_candle.clone()).await.is_err() {
                    info!("fan-out: subscriber sink closed for {pair_key} at 1min");
                }
                continue;
            }

            let key = (pair_key.clone(), sub.id);
            match aggregates.get_mut(&key) {
                None => {
                    aggregates.insert(key, minute_candle.clone());
                }
                Some(aggregate) => {
                    if sub.resolution.same_bucket(aggregate.start, minute_candle.start) {
                        aggregate.merge(&minute_candle);
                    } else {
                        let previous = aggregate.clone();
                        *aggregate = minute_candle.clone();
                        if sub.sink.send(previous).await.is_err() {
                            info!("fan-out: subscriber sink closed for {pair_key} at {:?}", sub.resolution);
                        }
                    }
                }
            }
        }
    }
}
