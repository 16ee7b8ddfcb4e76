//! Backtest Runner: polls the backtest request store for requests in state
//! NEW, replays historical candles through a strategy instance using the
//! same callback contract as the Strategy Worker, and persists simulated
//! trades against the backtest id.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::indicators::IndicatorBank;
use crate::domain::market::candle::Candle;
use crate::domain::repositories::{BacktestRequestRepository, CandleRepository, TradeRecordRepository};
use crate::domain::strategy::{Ohlcv, StrategyRegistry};
use crate::domain::trading::{Advice, BacktestRequest, BacktestStatus, SequenceDecision, TradeContext, TradeOwner, TradeRecord};

use crate::application::historical_query;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const PAGE_SIZE: usize = 100;
const DB_WRITE_RETRIES: usize = 3;

/// No cycle bound applies to a backtest replay; the sequencing rules
/// (no duplicate consecutive advice, no SELL before any BUY) are shared with
/// the Trader, but "done" never fires.
const UNBOUNDED_CYCLES: u32 = u32::MAX;

pub struct BacktestRunnerConfig {
    pub poll_interval: Duration,
    pub page_size: usize,
}

impl Default for BacktestRunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            page_size: PAGE_SIZE,
        }
    }
}

/// Perpetual loop: polls for NEW backtest requests and runs each to
/// completion before polling again.
pub async fn run(
    requests: Arc<dyn BacktestRequestRepository>,
    candles: Arc<dyn CandleRepository>,
    trade_records: Arc<dyn TradeRecordRepository>,
    strategies: Arc<StrategyRegistry>,
    config: BacktestRunnerConfig,
) {
    loop {
        match requests.find_oldest_new().await {
            Ok(Some(request)) => {
                let id = request.id;
                if let Err(e) = requests.update_status(id, BacktestStatus::Running).await {
                    error!(backtest_id = %id, "failed to transition backtest to RUNNING: {e}");
                    continue;
                }

                let outcome = run_one(&request, &candles, &trade_records, &strategies, &config).await;

                let final_status = match outcome {
                    Ok(()) => BacktestStatus::Finished,
                    Err(reason) => {
                        warn!(backtest_id = %id, "backtest failed: {reason}");
                        BacktestStatus::Error
                    }
                };
                if let Err(e) = requests.update_status(id, final_status).await {
                    error!(backtest_id = %id, "failed to persist final backtest status: {e}");
                }
            }
            Ok(None) => tokio::time::sleep(config.poll_interval).await,
            Err(e) => {
                error!("failed to query for new backtest requests: {e}");
                tokio::time::sleep(config.poll_interval).await;
            }
        }
    }
}

async fn run_one(
    request: &BacktestRequest,
    candles: &Arc<dyn CandleRepository>,
    trade_records: &Arc<dyn TradeRecordRepository>,
    strategies: &Arc<StrategyRegistry>,
    config: &BacktestRunnerConfig,
) -> Result<(), String> {
    let bid = request.id;
    debug!(backtest_id = %bid, "starting backtest");

    let mut strategy = strategies
        .build(&request.algo.strategy_name, &request.algo.strategy_parameters)
        .map_err(|e| e.to_string())?;

    let mut indicators = IndicatorBank::default();
    strategy.init(&mut indicators).map_err(|e| e.to_string())?;

    let mut history = Ohlcv::default();
    let mut ctx: Option<TradeContext> = None;

    let mut page_token: Option<i64> = None;
    loop {
        let page = historical_query::get_candles(
            candles,
            &request.algo.pair,
            request.start_ts,
            request.end_ts,
            request.algo.resolution,
            config.page_size,
            page_token,
        )
        .await
        .map_err(|e| e.to_string())?;

        let count = page.candles.len();
        for candle in &page.candles {
            process_candle(
                bid,
                &request.algo.pair,
                candle,
                &mut *strategy,
                &indicators,
                &mut history,
                &mut ctx,
                trade_records,
            )
            .await?;
        }

        page_token = page.next_page_token;
        if count < config.page_size || page_token.is_none() {
            break;
        }
    }

    info!(backtest_id = %bid, "backtest finished");
    Ok(())
}

async fn process_candle(
    bid: Uuid,
    pair: &crate::domain::market::asset::TradingPair,
    candle: &Candle,
    strategy: &mut dyn crate::domain::strategy::TradingStrategy,
    indicators: &IndicatorBank,
    history: &mut Ohlcv,
    ctx: &mut Option<TradeContext>,
    trade_records: &Arc<dyn TradeRecordRepository>,
) -> Result<(), String> {
    history.push_candle(candle);
    let indicator_values = indicators.recompute_all(history);

    strategy.process_candle(candle);
    let Some(advice) = strategy.execute(&indicator_values) else {
        return Ok(());
    };

    let decision = match ctx {
        None if advice == Advice::Sell => {
            debug!(backtest_id = %bid, "sell before any buy, ignoring");
            return Ok(());
        }
        None => {
            *ctx = Some(TradeContext::opening(advice, Decimal::ZERO));
            SequenceDecision::Proceed
        }
        Some(existing) => existing.sequence(advice, UNBOUNDED_CYCLES),
    };

    if decision == SequenceDecision::Continue {
        return Ok(());
    }

    // Unit base-lot simulation: BUY sells one unit of the base asset; SELL
    // sells back everything bought so far.
    let (sold_asset, sold_amount, bought_asset, bought_amount) = match advice {
        Advice::Buy => {
            let sold = dec!(1);
            let bought = candle.close * sold;
            (pair.base.key(), sold, pair.counter.key(), bought)
        }
        Advice::Sell => {
            let sold = ctx.as_ref().map(|c| c.buy_amount).unwrap_or(dec!(1));
            let bought = if candle.close.is_zero() {
                Decimal::ZERO
            } else {
                sold / candle.close
            };
            (pair.counter.key(), sold, pair.base.key(), bought)
        }
    };

    if let Some(c) = ctx.as_mut() {
        match advice {
            Advice::Buy => c.buy_amount = bought_amount,
            Advice::Sell => c.buy_amount = Decimal::ZERO,
        }
    }

    let record = TradeRecord {
        timestamp: chrono::Utc::now(),
        owner: TradeOwner::Backtest(bid),
        advice,
        sold_asset,
        sold_amount,
        bought_asset,
        bought_amount,
    };

    save_with_retries(trade_records, &record).await
}

async fn save_with_retries(
    trade_records: &Arc<dyn TradeRecordRepository>,
    record: &TradeRecord,
) -> Result<(), String> {
    let mut attempt = 0;
    loop {
        match trade_records.save(record).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                attempt += 1;
                if attempt >= DB_WRITE_RETRIES {
                    return Err(format!("cannot persist backtest trade after {DB_WRITE_RETRIES} attempts: {e}"));
                }
            }
        }
    }
}
