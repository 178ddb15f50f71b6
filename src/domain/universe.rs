//! Tradable instrument universe.
//!
//! The configured instrument list is parsed once at startup. Each cycle it is
//! intersected with what the data source reports as tradable, keeping the
//! configured order. If the source cannot be queried the configured list is
//! used unchanged.

use std::collections::HashSet;
use tracing::warn;

use crate::ports::data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty instrument list")]
    Empty,

    #[error("empty token in instrument list")]
    EmptyToken,

    #[error("duplicate instrument: {0}")]
    DuplicateInstrument(String),
}

pub fn parse_instruments(input: &str) -> Result<Vec<String>, UniverseError> {
    if input.trim().is_empty() {
        return Err(UniverseError::Empty);
    }

    let mut instruments = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let instrument = trimmed.to_string();
        if !seen.insert(instrument.clone()) {
            return Err(UniverseError::DuplicateInstrument(instrument));
        }
        instruments.push(instrument);
    }

    Ok(instruments)
}

/// Configured instruments that are also in `available`, in configured order.
pub fn select_tradable(configured: &[String], available: &HashSet<String>) -> Vec<String> {
    configured
        .iter()
        .filter(|i| available.contains(i.as_str()))
        .cloned()
        .collect()
}

pub fn resolve_universe(data: &dyn MarketDataPort, configured: &[String]) -> Vec<String> {
    match data.list_tradable_instruments() {
        Ok(available) => {
            let tradable = select_tradable(configured, &available);
            if tradable.len() < configured.len() {
                let missing: Vec<&str> = configured
                    .iter()
                    .filter(|i| !tradable.contains(i))
                    .map(String::as_str)
                    .collect();
                warn!(?missing, "configured instruments not tradable at source");
            }
            tradable
        }
        Err(e) => {
            warn!(error = %e, "tradable instrument lookup failed, using configured list");
            configured.to_vec()
        }
    }
}
