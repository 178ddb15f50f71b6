//! Summary statistics over persisted closed trades.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::ports::trade_sink::TradeRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Breakdown {
    pub trades: usize,
    pub wins: usize,
    pub total_pnl: f64,
}

impl Breakdown {
    fn add(&mut self, pnl: f64) {
        self.trades += 1;
        if pnl > 0.0 {
            self.wins += 1;
        }
        self.total_pnl += pnl;
    }

    /// Percentage in [0, 100].
    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.trades as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeStatistics {
    pub total_trades: usize,
    pub wins: usize,
    /// Break-even trades count as losses.
    pub losses: usize,
    /// Percentage in [0, 100].
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub best_pnl: f64,
    pub worst_pnl: f64,
    pub avg_duration_minutes: f64,
    pub by_instrument: BTreeMap<String, Breakdown>,
    pub by_side: BTreeMap<String, Breakdown>,
}

impl TradeStatistics {
    /// Open records in `records` are ignored.
    pub fn compute(records: &[TradeRecord]) -> Self {
        let mut stats = TradeStatistics {
            best_pnl: f64::NEG_INFINITY,
            worst_pnl: f64::INFINITY,
            ..TradeStatistics::default()
        };
        let mut total_duration = 0.0;

        for record in records.iter().filter(|r| r.is_closed()) {
            let pnl = record.pnl.unwrap_or(0.0);
            stats.total_trades += 1;
            if pnl > 0.0 {
                stats.wins += 1;
            } else {
                stats.losses += 1;
            }
            stats.total_pnl += pnl;
            stats.best_pnl = stats.best_pnl.max(pnl);
            stats.worst_pnl = stats.worst_pnl.min(pnl);
            total_duration += record.duration_minutes.unwrap_or(0.0);

            stats
                .by_instrument
                .entry(record.instrument.clone())
                .or_default()
                .add(pnl);
            stats
                .by_side
                .entry(record.side.to_string())
                .or_default()
                .add(pnl);
        }

        if stats.total_trades == 0 {
            stats.best_pnl = 0.0;
            stats.worst_pnl = 0.0;
            return stats;
        }

        let n = stats.total_trades as f64;
        stats.win_rate = stats.wins as f64 / n * 100.0;
        stats.avg_pnl = stats.total_pnl / n;
        stats.avg_duration_minutes = total_duration / n;
        stats
    }
}
