pub mod backtest;
pub mod candle;
pub mod condition;
pub mod error;
pub mod factory;
pub mod indicator;
pub mod metrics;
pub mod portfolio;
pub mod rule;
pub mod snapshot;
pub mod strategy;
