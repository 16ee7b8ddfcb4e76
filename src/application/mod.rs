//! Use-case layer: the long-running components (Candle Aggregator,
//! Resolution Fan-out, Engine Controller, Trader, Backtest Runner), the
//! strategy callback harness (indicators + worker), the historical query
//! layer, and the composition root that wires them all together.

pub mod backtest_runner;
pub mod bootstrap;
pub mod dispatcher;
pub mod engine;
pub mod fanout;
pub mod fetcher;
pub mod historical_query;
pub mod indicators;
pub mod strategies;
pub mod strategy_worker;
pub mod trader;
