//! Composition root: builds every channel up front, wires each component
//! with its injected `Arc<dyn Trait>` dependencies, spawns the long-running
//! tasks, and hands back a [`SystemHandle`] bundling the parts the HTTP layer
//! needs (the engine-command sender) plus the join handles for shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

use crate::application::backtest_runner::{self, BacktestRunnerConfig};
use crate::application::engine::{EngineCommand, EngineController};
use crate::application::fanout::{self, FanoutRegistry};
use crate::application::fetcher::{self, FetcherConfig};
use crate::application::strategies;
use crate::application::trader::{self, TraderConfig};
use crate::config::Config;
use crate::domain::ports::ExchangeAdapter;
use crate::domain::repositories::{
    BacktestRequestRepository, CandleRepository, DeploymentRepository, StateRepository,
    TradeRecordRepository,
};
use crate::domain::strategy::StrategyRegistry;
use crate::domain::trading::TradeContextMap;
use crate::infrastructure::mock_exchange::MockExchangeAdapter;
use crate::infrastructure::persistence::{
    Database, SqliteAlgoRepository, SqliteBacktestRequestRepository,
    SqliteBacktestTradeRecordRepository, SqliteCandleRepository, SqliteDeploymentRepository,
    SqliteStateRepository, SqliteTradeRecordRepository,
};

/// Every repository this crate persists to, grouped for convenient
/// injection. Built once against the two open SQLite pools.
pub struct Repositories {
    pub algos: Arc<SqliteAlgoRepository>,
    pub deployments: Arc<dyn DeploymentRepository>,
    pub trade_records: Arc<dyn TradeRecordRepository>,
    pub backtest_requests: Arc<dyn BacktestRequestRepository>,
    pub backtest_trade_records: Arc<dyn TradeRecordRepository>,
    pub candles: Arc<dyn CandleRepository>,
    pub state: Arc<dyn StateRepository>,
}

/// External-facing handles returned once the system is running: the
/// channel the HTTP layer submits deploy/undeploy commands on, the shared
/// deployment-scoped trade contexts it reads status from, and the spawned
/// tasks' join handles for a coordinated shutdown.
pub struct SystemHandle {
    pub engine_cmd_tx: mpsc::Sender<EngineCommand>,
    pub repositories: Arc<Repositories>,
    pub trade_contexts: Arc<TradeContextMap>,
    tasks: Vec<JoinHandle<()>>,
}

impl SystemHandle {
    /// Aborts every spawned background task. Used on `ctrl_c` in the server
    /// entry point; not graceful, but every mutation this system makes is
    /// either idempotent or already durably persisted before being applied.
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Builds and starts the full system: Candle Aggregator, Resolution Fan-out,
/// Engine Controller, Trader, and Backtest Runner, each as its own
/// `tokio::spawn` task wired through bounded channels.
pub async fn build(config: &Config) -> Result<SystemHandle> {
    let main_db = Database::main(&config.database.main_db_path)
        .await
        .context("failed to open main database")?;
    let backtest_db = Database::backtest(&config.database.backtest_db_path)
        .await
        .context("failed to open backtest database")?;

    let repositories = Arc::new(Repositories {
        algos: Arc::new(SqliteAlgoRepository::new(main_db.pool.clone())),
        deployments: Arc::new(SqliteDeploymentRepository::new(main_db.pool.clone())),
        trade_records: Arc::new(SqliteTradeRecordRepository::new(main_db.pool.clone())),
        backtest_requests: Arc::new(SqliteBacktestRequestRepository::new(backtest_db.pool.clone())),
        backtest_trade_records: Arc::new(SqliteBacktestTradeRecordRepository::new(backtest_db.pool.clone())),
        candles: Arc::new(SqliteCandleRepository::new(main_db.pool.clone())),
        state: Arc::new(SqliteStateRepository::new(main_db.pool.clone())),
    });

    let exchange: Arc<dyn ExchangeAdapter> = Arc::new(MockExchangeAdapter::new());
    // Each consumer needs its own ownership shape (owned vs. Arc-shared), so
    // the registry is built twice rather than shared; registration is cheap
    // (a handful of hashmap inserts at startup).
    let engine_strategies = strategies::default_registry();
    let backtest_strategies: Arc<StrategyRegistry> = Arc::new(strategies::default_registry());
    let trade_contexts = Arc::new(TradeContextMap::default());

    let (minute_candle_tx, minute_candle_rx) = mpsc::channel(config.engine.candle_channel_capacity);
    let (advice_tx, advice_rx) = mpsc::channel(config.engine.advice_channel_capacity);
    let (engine_cmd_tx, engine_cmd_rx) = mpsc::channel(config.engine.engine_command_channel_capacity);
    let fanout_registry: FanoutRegistry = Arc::new(Mutex::new(HashMap::new()));

    let mut tasks = Vec::new();

    info!("starting candle aggregator");
    tasks.push(tokio::spawn(fetcher::run(
        exchange.clone(),
        repositories.state.clone(),
        FetcherConfig {
            poll_interval: config.engine.fetcher_poll_interval,
            ..FetcherConfig::default()
        },
        minute_candle_tx,
    )));

    info!("starting resolution fan-out");
    tasks.push(tokio::spawn(fanout::run(minute_candle_rx, fanout_registry.clone())));

    info!("starting trader");
    let trader_config = Arc::new(TraderConfig {
        trading_account: config.exchange.account.clone(),
        signers: vec![config.exchange.signing_secret.clone()],
    });
    tasks.push(tokio::spawn(trader::run(
        advice_rx,
        exchange.clone(),
        repositories.trade_records.clone(),
        trade_contexts.clone(),
        trader_config,
        engine_cmd_tx.clone(),
    )));

    info!("starting backtest runner");
    tasks.push(tokio::spawn(backtest_runner::run(
        repositories.backtest_requests.clone(),
        repositories.candles.clone(),
        repositories.backtest_trade_records.clone(),
        backtest_strategies,
        BacktestRunnerConfig::default(),
    )));

    info!("starting engine controller");
    let engine = EngineController::new(
        engine_strategies,
        repositories.deployments.clone(),
        fanout_registry,
        advice_tx,
    );
    tasks.push(tokio::spawn(engine.run(engine_cmd_rx)));

    // Resume any deployment left RUNNING across a restart.
    for deployment in repositories.deployments.find_active().await.unwrap_or_default() {
        if engine_cmd_tx
            .send(EngineCommand::Deploy(Box::new(deployment)))
            .await
            .is_err()
        {
            break;
        }
    }

    Ok(SystemHandle {
        engine_cmd_tx,
        repositories,
        trade_contexts,
        tasks,
    })
}
