//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod ledger;
pub mod strategy;
pub mod rotation;
pub mod metrics;
pub mod backtest;
pub mod comparison;
pub mod sweep;
pub mod config_validation;
pub mod error;
