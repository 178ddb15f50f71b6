//! Exit rules for an open position.
//!
//! Checked once per tick in a fixed order, first match wins:
//!   1. max duration reached, regardless of price
//!   2. trailing stop breached (only after the minimum duration)
//!   3. initial stop loss breached (always active)
//!
//! After the minimum duration, a new profit high re-derives the trailing
//! stop from the tier table. The stop only tightens: max of old and new for
//! LONG, min for SHORT.

use chrono::{DateTime, Duration, Utc};

use super::error::TraderError;
use super::position::{ExitReason, Position, Side};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailingTier {
    pub min_profit: f64,
    pub trail_pct: f64,
}

/// Tiers sorted by strictly ascending `min_profit`. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct TrailingTable {
    tiers: Vec<TrailingTier>,
}

impl TrailingTable {
    pub fn new(tiers: Vec<TrailingTier>) -> Result<Self, String> {
        if tiers.is_empty() {
            return Err("at least one tier is required".into());
        }
        for tier in &tiers {
            if !tier.min_profit.is_finite() || tier.min_profit < 0.0 {
                return Err(format!("invalid min_profit {}", tier.min_profit));
            }
            if !(tier.trail_pct > 0.0 && tier.trail_pct < 1.0) {
                return Err(format!("trail_pct {} must be in (0, 1)", tier.trail_pct));
            }
        }
        if tiers.windows(2).any(|w| w[1].min_profit <= w[0].min_profit) {
            return Err("min_profit thresholds must be strictly ascending".into());
        }
        Ok(TrailingTable { tiers })
    }

    /// Parse `min_profit:trail_pct` pairs separated by commas,
    /// e.g. `0.0:0.015, 0.015:0.012`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut tiers = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (min_profit, trail_pct) = part
                .split_once(':')
                .ok_or_else(|| format!("expected min_profit:trail_pct, got '{part}'"))?;
            let min_profit: f64 = min_profit
                .trim()
                .parse()
                .map_err(|_| format!("invalid min_profit '{}'", min_profit.trim()))?;
            let trail_pct: f64 = trail_pct
                .trim()
                .parse()
                .map_err(|_| format!("invalid trail_pct '{}'", trail_pct.trim()))?;
            tiers.push(TrailingTier {
                min_profit,
                trail_pct,
            });
        }
        Self::new(tiers)
    }

    pub fn tiers(&self) -> &[TrailingTier] {
        &self.tiers
    }

    /// Trail distance of the highest tier whose threshold is at or below
    /// `profit`, or the first tier's when none is.
    pub fn trail_pct_for(&self, profit: f64) -> f64 {
        self.tiers
            .iter()
            .rev()
            .find(|t| profit >= t.min_profit)
            .unwrap_or(&self.tiers[0])
            .trail_pct
    }
}

impl Default for TrailingTable {
    fn default() -> Self {
        TrailingTable {
            tiers: [(0.0, 0.015), (0.015, 0.012), (0.03, 0.010), (0.05, 0.008)]
                .into_iter()
                .map(|(min_profit, trail_pct)| TrailingTier {
                    min_profit,
                    trail_pct,
                })
                .collect(),
        }
    }
}

impl TryFrom<&str> for TrailingTable {
    type Error = TraderError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
            .map_err(|reason| TraderError::invalid_config("risk", "trailing_tiers", reason))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitPolicy {
    pub stop_loss_pct: f64,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub tiers: TrailingTable,
}

impl Default for ExitPolicy {
    fn default() -> Self {
        ExitPolicy {
            stop_loss_pct: 0.01,
            min_duration: Duration::minutes(5),
            max_duration: Duration::minutes(120),
            tiers: TrailingTable::default(),
        }
    }
}

impl ExitPolicy {
    pub fn initial_stop(&self, position: &Position) -> f64 {
        match position.side {
            Side::Long => position.entry_price * (1.0 - self.stop_loss_pct),
            Side::Short => position.entry_price * (1.0 + self.stop_loss_pct),
        }
    }

    /// Update the position's trailing state for this tick and decide
    /// whether it must close.
    pub fn evaluate(
        &self,
        position: &mut Position,
        price: f64,
        now: DateTime<Utc>,
    ) -> Option<ExitReason> {
        let duration = position.duration(now);
        if duration >= self.max_duration {
            return Some(ExitReason::MaxDuration);
        }

        if duration >= self.min_duration {
            self.update_trailing(position, price);
            if let Some(stop) = position.trailing_stop {
                if breached(position.side, price, stop) {
                    return Some(ExitReason::TrailingStop);
                }
            }
        }

        if breached(position.side, price, self.initial_stop(position)) {
            return Some(ExitReason::StopLoss);
        }

        None
    }

    fn update_trailing(&self, position: &mut Position, price: f64) {
        let profit = position.profit_fraction(price);
        if profit <= position.highest_profit {
            return;
        }
        position.highest_profit = profit;

        let trail = self.tiers.trail_pct_for(profit);
        let candidate = match position.side {
            Side::Long => price * (1.0 - trail),
            Side::Short => price * (1.0 + trail),
        };
        position.trailing_stop = Some(match (position.side, position.trailing_stop) {
            (_, None) => candidate,
            (Side::Long, Some(old)) => old.max(candidate),
            (Side::Short, Some(old)) => old.min(candidate),
        });
    }
}

/// Adverse cross of `level`, inclusive.
fn breached(side: Side, price: f64, level: f64) -> bool {
    match side {
        Side::Long => price <= level,
        Side::Short => price >= level,
    }
}
