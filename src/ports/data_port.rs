//! Market data port trait.

use std::collections::HashSet;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::PriceSeries;

pub trait MarketDataPort {
    /// Recent candles for `instrument` at `interval` (e.g. `5m`), oldest first.
    ///
    /// Unreachable sources and malformed payloads are reported as
    /// [`TraderError::Unavailable`].
    fn fetch_candles(&self, instrument: &str, interval: &str) -> Result<PriceSeries, TraderError>;

    /// Instruments the source currently allows trading.
    fn list_tradable_instruments(&self) -> Result<HashSet<String>, TraderError>;
}
