//! Simulated capital, open positions and trade counters.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::position::{ClosedTrade, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub capital: f64,
    pub initial_capital: f64,
    pub total_pnl: f64,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub positions: HashMap<String, Position>,
}

/// Point-in-time view of the portfolio handed to the trade sink.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSnapshot {
    pub timestamp: DateTime<Utc>,
    pub capital: f64,
    /// Capital not committed as margin to open positions.
    pub available_capital: f64,
    pub total_pnl: f64,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    /// Percentage in [0, 100].
    pub win_rate: f64,
    pub open_positions: usize,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            capital: initial_capital,
            initial_capital,
            total_pnl: 0.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            positions: HashMap::new(),
        }
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.insert(position.instrument.clone(), position);
    }

    pub fn get_position(&self, instrument: &str) -> Option<&Position> {
        self.positions.get(instrument)
    }

    pub fn get_position_mut(&mut self, instrument: &str) -> Option<&mut Position> {
        self.positions.get_mut(instrument)
    }

    pub fn has_position(&self, instrument: &str) -> bool {
        self.positions.contains_key(instrument)
    }

    pub fn remove_position(&mut self, instrument: &str) -> Option<Position> {
        self.positions.remove(instrument)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Apply a realized trade to capital and counters. Break-even counts as
    /// a loss.
    pub fn record_close(&mut self, trade: &ClosedTrade) {
        self.capital += trade.pnl;
        self.total_pnl += trade.pnl;
        self.total_trades += 1;
        if trade.is_win() {
            self.winning_trades += 1;
        } else {
            self.losing_trades += 1;
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            f64::from(self.winning_trades) / f64::from(self.total_trades) * 100.0
        }
    }

    pub fn margin_in_use(&self) -> f64 {
        self.positions
            .values()
            .map(|p| p.notional / p.leverage)
            .sum()
    }

    pub fn snapshot(&self, timestamp: DateTime<Utc>) -> PortfolioSnapshot {
        PortfolioSnapshot {
            timestamp,
            capital: self.capital,
            available_capital: self.capital - self.margin_in_use(),
            total_pnl: self.total_pnl,
            total_trades: self.total_trades,
            winning_trades: self.winning_trades,
            losing_trades: self.losing_trades,
            win_rate: self.win_rate(),
            open_positions: self.position_count(),
        }
    }
}
