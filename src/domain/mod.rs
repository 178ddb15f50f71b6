//! Core domain types and logic.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod exit_policy;
pub mod indicator;
pub mod ledger;
pub mod ohlcv;
pub mod portfolio;
pub mod position;
pub mod signal;
pub mod sizing;
pub mod stats;
pub mod universe;
