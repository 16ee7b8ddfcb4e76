//! Drives the Trader against a cycle-bound deployment (`num_cycles = 2`)
//! through the raw advice sequence BUY, BUY, SELL, BUY, SELL, SELL and
//! checks that the duplicate BUY is swallowed, exactly four trades settle
//! across the two allowed cycles, and the final SELL is rejected as DONE.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use uuid::Uuid;

use stardust_engine::application::trader::{self, TraderConfig};
use stardust_engine::domain::market::asset::{Asset, TradingPair};
use stardust_engine::domain::ports::Bid;
use stardust_engine::domain::repositories::TradeRecordRepository;
use stardust_engine::domain::trading::{Advice, TradeAdvice, TradeContextMap, TradeOwner};
use stardust_engine::infrastructure::mock_exchange::MockExchangeAdapter;
use stardust_engine::infrastructure::persistence::{Database, SqliteTradeRecordRepository};

fn pair() -> TradingPair {
    TradingPair::new(Asset::Native, Asset::issued("USD", "IssuerA"))
}

fn advice(did: Uuid, which: Advice) -> TradeAdvice {
    TradeAdvice {
        user_id: "owner-1".to_string(),
        deployment_id: did,
        pair: pair(),
        advice: which,
        amount: dec!(100),
        num_cycles: 2,
    }
}

#[tokio::test]
async fn cycle_bound_sequence_settles_four_trades_and_rejects_the_overflow_sell() {
    let exchange = Arc::new(MockExchangeAdapter::new());
    exchange
        .seed_orderbook(Asset::issued("USD", "IssuerA"), Asset::Native, vec![Bid { amount: dec!(1_000_000), price: dec!(1) }])
        .await;
    exchange
        .seed_orderbook(Asset::Native, Asset::issued("USD", "IssuerA"), vec![Bid { amount: dec!(1_000_000), price: dec!(1) }])
        .await;

    let db = Database::main("sqlite::memory:").await.unwrap();
    let trade_records: Arc<dyn TradeRecordRepository> = Arc::new(SqliteTradeRecordRepository::new(db.pool.clone()));
    let contexts = Arc::new(TradeContextMap::default());
    let config = Arc::new(TraderConfig {
        trading_account: "trader-account".to_string(),
        signers: vec!["secret".to_string()],
    });

    let (advice_tx, advice_rx) = mpsc::channel(16);
    let (engine_cmd_tx, _engine_cmd_rx) = mpsc::channel(16);

    let contexts_probe = contexts.clone();
    let handle = tokio::spawn(trader::run(advice_rx, exchange, trade_records.clone(), contexts, config, engine_cmd_tx));

    let did = Uuid::new_v4();

    async fn wait_for_count(records: &Arc<dyn TradeRecordRepository>, owner: TradeOwner, want: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if records.find_by_owner(owner).await.unwrap().len() == want {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("trade record count should converge before the timeout");
    }

    advice_tx.send(advice(did, Advice::Buy)).await.unwrap();
    wait_for_count(&trade_records, TradeOwner::Deployment(did), 1).await;

    advice_tx.send(advice(did, Advice::Buy)).await.unwrap();
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }

    advice_tx.send(advice(did, Advice::Sell)).await.unwrap();
    wait_for_count(&trade_records, TradeOwner::Deployment(did), 2).await;

    advice_tx.send(advice(did, Advice::Buy)).await.unwrap();
    wait_for_count(&trade_records, TradeOwner::Deployment(did), 3).await;

    advice_tx.send(advice(did, Advice::Sell)).await.unwrap();
    wait_for_count(&trade_records, TradeOwner::Deployment(did), 4).await;

    advice_tx.send(advice(did, Advice::Sell)).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), async {
        while contexts_probe.get(did).await.is_some() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("the overflow SELL should discard the deployment's trade context as DONE");

    let records = trade_records.find_by_owner(TradeOwner::Deployment(did)).await.unwrap();
    assert_eq!(records.len(), 4);
    let advices: Vec<Advice> = records.iter().map(|r| r.advice).collect();
    assert_eq!(advices, vec![Advice::Buy, Advice::Sell, Advice::Buy, Advice::Sell]);
    for record in &records {
        assert_eq!(record.sold_amount, dec!(100));
        assert_eq!(record.bought_amount, dec!(100));
    }

    drop(advice_tx);
    handle.abort();
}
