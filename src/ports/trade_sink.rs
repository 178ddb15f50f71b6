//! Persistence port for trade and portfolio history.

use chrono::{DateTime, Utc};

use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorVector;
use crate::domain::portfolio::PortfolioSnapshot;
use crate::domain::position::{ClosedTrade, Position, Side};
use crate::domain::signal::SignalScore;

/// One row of the trade history as read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub id: i64,
    pub instrument: String,
    pub opened_at: DateTime<Utc>,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub units: f64,
    pub notional: f64,
    pub leverage: f64,
    pub pnl: Option<f64>,
    /// Percent, i.e. fraction × 100.
    pub pnl_pct: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub exit_reason: Option<String>,
    pub bull_score: u8,
    pub bear_score: u8,
}

impl TradeRecord {
    pub fn is_closed(&self) -> bool {
        self.exit_price.is_some()
    }
}

pub trait TradeSink {
    fn append_trade_open(
        &self,
        position: &Position,
        indicators: &IndicatorVector,
        score: &SignalScore,
    ) -> Result<(), TraderError>;

    /// Finalize the most recent open record for the trade's instrument.
    fn finalize_trade_close(&self, trade: &ClosedTrade) -> Result<(), TraderError>;

    fn append_portfolio_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<(), TraderError>;

    /// Closed trades, oldest first.
    fn query_closed_trades(&self) -> Result<Vec<TradeRecord>, TraderError>;
}
