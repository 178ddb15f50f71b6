//! papertrader: simulated leveraged trading of crypto perpetuals.
//!
//! Hexagonal architecture: indicator, signal, sizing, exit and ledger logic
//! in [`domain`], port traits in [`ports`], concrete data sources, stores and
//! config readers in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
