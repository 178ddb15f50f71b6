//! Position ledger: the one owner of open positions and portfolio counters.
//!
//! Per instrument the ledger is either flat or holds exactly one position.
//! Opening over an existing position is rejected. Evaluating or closing a
//! missing position is a no-op.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::error::TraderError;
use super::exit_policy::ExitPolicy;
use super::indicator::IndicatorVector;
use super::portfolio::{Portfolio, PortfolioSnapshot};
use super::position::{ClosedTrade, ExitReason, Position, Side};
use super::signal::SignalScore;
use super::sizing::{SizingParams, size_position};

#[derive(Debug, Clone)]
pub struct PositionLedger {
    portfolio: Portfolio,
    sizing: SizingParams,
    policy: ExitPolicy,
}

impl PositionLedger {
    pub fn new(initial_capital: f64, sizing: SizingParams, policy: ExitPolicy) -> Self {
        PositionLedger {
            portfolio: Portfolio::new(initial_capital),
            sizing,
            policy,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn policy(&self) -> &ExitPolicy {
        &self.policy
    }

    pub fn has_position(&self, instrument: &str) -> bool {
        self.portfolio.has_position(instrument)
    }

    pub fn position(&self, instrument: &str) -> Option<&Position> {
        self.portfolio.get_position(instrument)
    }

    pub fn open_instruments(&self) -> Vec<String> {
        let mut instruments: Vec<String> = self.portfolio.positions.keys().cloned().collect();
        instruments.sort();
        instruments
    }

    /// Open a position sized from current capital.
    ///
    /// Returns `Ok(None)` when the sizer yields nothing to trade.
    pub fn open(
        &mut self,
        instrument: &str,
        side: Side,
        price: f64,
        now: DateTime<Utc>,
        indicators: IndicatorVector,
        score: SignalScore,
    ) -> Result<Option<&Position>, TraderError> {
        if self.portfolio.has_position(instrument) {
            return Err(TraderError::LedgerInvariantViolation {
                instrument: instrument.to_string(),
            });
        }

        let Some(size) = size_position(self.portfolio.capital, &self.sizing, price)? else {
            return Ok(None);
        };

        self.portfolio.add_position(Position {
            instrument: instrument.to_string(),
            side,
            entry_price: price,
            entry_time: now,
            units: size.units,
            notional: size.notional,
            leverage: self.sizing.leverage,
            highest_profit: 0.0,
            trailing_stop: None,
            entry_indicators: indicators,
            entry_score: score,
        });
        Ok(self.portfolio.get_position(instrument))
    }

    /// Run the exit policy against the open position, updating its trailing
    /// state. `None` when flat or when no exit fires.
    pub fn evaluate_exit(
        &mut self,
        instrument: &str,
        price: f64,
        now: DateTime<Utc>,
    ) -> Option<ExitReason> {
        let position = self.portfolio.get_position_mut(instrument)?;
        self.policy.evaluate(position, price, now)
    }

    /// Close the position and realize its PnL. `None` when already flat.
    pub fn close(
        &mut self,
        instrument: &str,
        price: f64,
        now: DateTime<Utc>,
        reason: ExitReason,
    ) -> Option<ClosedTrade> {
        let position = self.portfolio.remove_position(instrument)?;
        let trade = ClosedTrade::from_position(&position, price, now, reason);
        self.portfolio.record_close(&trade);
        Some(trade)
    }

    /// Close every open position at its last known price, falling back to
    /// the entry price when none is known.
    pub fn close_all(
        &mut self,
        last_prices: &HashMap<String, f64>,
        now: DateTime<Utc>,
        reason: ExitReason,
    ) -> Vec<ClosedTrade> {
        self.open_instruments()
            .into_iter()
            .filter_map(|instrument| {
                let price = last_prices
                    .get(&instrument)
                    .copied()
                    .or_else(|| self.position(&instrument).map(|p| p.entry_price))?;
                self.close(&instrument, price, now, reason)
            })
            .collect()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> PortfolioSnapshot {
        self.portfolio.snapshot(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::Signal;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn ledger() -> PositionLedger {
        PositionLedger::new(1000.0, SizingParams::default(), ExitPolicy::default())
    }

    fn score(signal: Signal) -> SignalScore {
        SignalScore {
            bull_score: 5,
            bear_score: 2,
            signal,
        }
    }

    fn open(ledger: &mut PositionLedger, instrument: &str, side: Side, price: f64) {
        ledger
            .open(
                instrument,
                side,
                price,
                t0(),
                IndicatorVector::neutral(t0(), price),
                score(Signal::Long),
            )
            .unwrap()
            .unwrap();
    }

    #[test]
    fn open_sizes_from_capital() {
        let mut ledger = ledger();
        open(&mut ledger, "BTC", Side::Long, 100.0);
        let pos = ledger.position("BTC").unwrap();
        assert!((pos.notional - 500.0).abs() < 1e-9);
        assert!((pos.units - 5.0).abs() < 1e-9);
        assert!((pos.leverage - 2.0).abs() < f64::EPSILON);
        assert_eq!(pos.trailing_stop, None);
    }

    #[test]
    fn second_open_is_rejected() {
        let mut ledger = ledger();
        open(&mut ledger, "BTC", Side::Long, 100.0);
        let err = ledger
            .open(
                "BTC",
                Side::Short,
                120.0,
                t0(),
                IndicatorVector::neutral(t0(), 120.0),
                score(Signal::Short),
            )
            .unwrap_err();
        assert!(matches!(err, TraderError::LedgerInvariantViolation { .. }));

        let pos = ledger.position("BTC").unwrap();
        assert_eq!(pos.side, Side::Long);
        assert!((pos.entry_price - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn open_rejects_invalid_price() {
        let mut ledger = ledger();
        let err = ledger
            .open(
                "BTC",
                Side::Long,
                0.0,
                t0(),
                IndicatorVector::neutral(t0(), 1.0),
                score(Signal::Long),
            )
            .unwrap_err();
        assert!(matches!(err, TraderError::InvalidPrice { .. }));
        assert!(!ledger.has_position("BTC"));
    }

    #[test]
    fn round_trip_at_same_price_is_flat() {
        let mut ledger = ledger();
        open(&mut ledger, "ETH", Side::Short, 2500.0);
        let trade = ledger
            .close("ETH", 2500.0, t0(), ExitReason::ManualStop)
            .unwrap();
        assert!(trade.pnl.abs() < 1e-9);
        assert!((ledger.portfolio().capital - 1000.0).abs() < 1e-9);
        assert_eq!(ledger.portfolio().losing_trades, 1);
        assert!(!ledger.has_position("ETH"));
    }

    #[test]
    fn long_close_applies_leverage() {
        let mut ledger = ledger();
        open(&mut ledger, "BTC", Side::Long, 100.0);
        let exit = t0() + Duration::minutes(45);
        let trade = ledger
            .close("BTC", 110.0, exit, ExitReason::TrailingStop)
            .unwrap();

        assert!((trade.pnl_fraction - 0.10).abs() < 1e-12);
        assert!((trade.pnl - 100.0).abs() < 1e-9);
        assert_eq!(trade.duration(), Duration::minutes(45));

        let portfolio = ledger.portfolio();
        assert!((portfolio.capital - 1100.0).abs() < 1e-9);
        assert!((portfolio.total_pnl - 100.0).abs() < 1e-9);
        assert_eq!(portfolio.winning_trades, 1);
    }

    #[test]
    fn stop_loss_costs_risk_fraction() {
        let mut ledger = ledger();
        open(&mut ledger, "SOL", Side::Long, 100.0);
        let reason = ledger.evaluate_exit("SOL", 99.0, t0() + Duration::minutes(1));
        assert_eq!(reason, Some(ExitReason::StopLoss));
        let trade = ledger.close("SOL", 99.0, t0(), ExitReason::StopLoss).unwrap();
        assert!((trade.pnl + 10.0).abs() < 1e-9);
    }

    #[test]
    fn missing_position_is_noop() {
        let mut ledger = ledger();
        assert_eq!(ledger.evaluate_exit("ARB", 1.0, t0()), None);
        assert!(ledger.close("ARB", 1.0, t0(), ExitReason::ManualStop).is_none());
        assert_eq!(ledger.portfolio().total_trades, 0);
    }

    #[test]
    fn evaluate_exit_tracks_trailing_state() {
        let mut ledger = ledger();
        open(&mut ledger, "BTC", Side::Long, 100.0);
        assert_eq!(
            ledger.evaluate_exit("BTC", 102.0, t0() + Duration::minutes(10)),
            None
        );
        let pos = ledger.position("BTC").unwrap();
        assert!((pos.highest_profit - 0.02).abs() < 1e-12);
        assert!(pos.trailing_stop.is_some());
    }

    #[test]
    fn close_all_uses_last_prices() {
        let mut ledger = ledger();
        open(&mut ledger, "BTC", Side::Long, 100.0);
        open(&mut ledger, "ETH", Side::Short, 50.0);

        let prices = HashMap::from([("BTC".to_string(), 101.0)]);
        let trades = ledger.close_all(&prices, t0(), ExitReason::ManualStop);

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].instrument, "BTC");
        assert!((trades[0].exit_price - 101.0).abs() < f64::EPSILON);
        // no known price: closed at entry
        assert!((trades[1].exit_price - 50.0).abs() < f64::EPSILON);
        assert!(trades.iter().all(|t| t.reason == ExitReason::ManualStop));
        assert_eq!(ledger.portfolio().position_count(), 0);
    }

    #[test]
    fn sizing_follows_realized_capital() {
        let mut ledger = ledger();
        open(&mut ledger, "BTC", Side::Long, 100.0);
        ledger.close("BTC", 110.0, t0(), ExitReason::TrailingStop);
        open(&mut ledger, "BTC", Side::Long, 100.0);
        let pos = ledger.position("BTC").unwrap();
        assert!((pos.notional - 550.0).abs() < 1e-9);
    }
}
