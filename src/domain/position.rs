//! Open positions and finalized trades.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use super::indicator::IndicatorVector;
use super::signal::{Signal, SignalScore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn from_signal(signal: Signal) -> Option<Side> {
        match signal {
            Signal::Long => Some(Side::Long),
            Signal::Short => Some(Side::Short),
            Signal::Neutral => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }

    pub fn parse(s: &str) -> Option<Side> {
        match s {
            "LONG" => Some(Side::Long),
            "SHORT" => Some(Side::Short),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    MaxDuration,
    TrailingStop,
    StopLoss,
    ManualStop,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::MaxDuration => "max duration",
            ExitReason::TrailingStop => "trailing stop",
            ExitReason::StopLoss => "stop loss",
            ExitReason::ManualStop => "manual stop",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub instrument: String,
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub units: f64,
    pub notional: f64,
    pub leverage: f64,
    /// High-water mark of the unrealized profit fraction.
    pub highest_profit: f64,
    pub trailing_stop: Option<f64>,
    pub entry_indicators: IndicatorVector,
    pub entry_score: SignalScore,
}

impl Position {
    /// Unleveraged profit fraction at `price`, positive when in the money.
    pub fn profit_fraction(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => (price - self.entry_price) / self.entry_price,
            Side::Short => (self.entry_price - price) / self.entry_price,
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.profit_fraction(price) * self.notional * self.leverage
    }

    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        now - self.entry_time
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub instrument: String,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub units: f64,
    pub notional: f64,
    pub leverage: f64,
    pub pnl: f64,
    pub pnl_fraction: f64,
    pub reason: ExitReason,
}

impl ClosedTrade {
    pub fn from_position(
        position: &Position,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: ExitReason,
    ) -> Self {
        let pnl_fraction = position.profit_fraction(exit_price);
        ClosedTrade {
            instrument: position.instrument.clone(),
            side: position.side,
            entry_price: position.entry_price,
            exit_price,
            entry_time: position.entry_time,
            exit_time,
            units: position.units,
            notional: position.notional,
            leverage: position.leverage,
            pnl: pnl_fraction * position.notional * position.leverage,
            pnl_fraction,
            reason,
        }
    }

    pub fn duration(&self) -> Duration {
        self.exit_time - self.entry_time
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration().num_seconds() as f64 / 60.0
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}
