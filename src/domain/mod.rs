// Market data domain: assets, trading pairs, candles, resolutions
pub mod market;

// Port interfaces to the exchange
pub mod ports;

// Repository traits for persisted state
pub mod repositories;

// Strategy capability trait, indicator registry plumbing, strategy factory
pub mod strategy;

// Core trading domain: advice, algos, deployments, trade contexts, records
pub mod trading;

// Domain-specific error types
pub mod errors;
