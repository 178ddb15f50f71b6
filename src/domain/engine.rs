//! Polling driver loop.
//!
//! One cycle walks the tradable instruments in order. For each it fetches
//! candles, computes indicators and classifies. A flat instrument may open a
//! position on a LONG or SHORT signal. An instrument in a position is only
//! evaluated for exit, so a position closed this tick cannot reopen until the
//! next one. Failures are isolated per instrument and never abort the cycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::clock::Clock;
use super::config::TradingSettings;
use super::error::TraderError;
use super::indicator::compute_indicators;
use super::ledger::PositionLedger;
use super::portfolio::PortfolioSnapshot;
use super::position::{ClosedTrade, ExitReason, Side};
use super::signal::classify;
use super::universe::resolve_universe;
use crate::ports::data_port::MarketDataPort;
use crate::ports::trade_sink::TradeSink;

/// Cycles between summary log lines.
const HEADER_EVERY: u64 = 10;
/// Upper bound on one uninterrupted sleep so a stop request is seen promptly.
const SLEEP_SLICE: Duration = Duration::from_secs(1);

/// What happened to one instrument during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentOutcome {
    /// Flat and no signal, or the sizer declined.
    Flat,
    Opened(Side),
    Held,
    Closed(ExitReason),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub evaluated: usize,
    pub skipped: usize,
    pub opened: usize,
    pub closed: usize,
}

pub struct TradingEngine<'a> {
    data: &'a dyn MarketDataPort,
    sink: &'a dyn TradeSink,
    clock: &'a dyn Clock,
    settings: TradingSettings,
    ledger: PositionLedger,
    last_prices: HashMap<String, f64>,
    cycle: u64,
}

impl<'a> TradingEngine<'a> {
    pub fn new(
        data: &'a dyn MarketDataPort,
        sink: &'a dyn TradeSink,
        clock: &'a dyn Clock,
        settings: TradingSettings,
        ledger: PositionLedger,
    ) -> Self {
        TradingEngine {
            data,
            sink,
            clock,
            settings,
            ledger,
            last_prices: HashMap::new(),
            cycle: 0,
        }
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn last_price(&self, instrument: &str) -> Option<f64> {
        self.last_prices.get(instrument).copied()
    }

    pub fn run_cycle(&mut self) -> CycleReport {
        self.cycle += 1;
        let mut report = CycleReport {
            cycle: self.cycle,
            ..CycleReport::default()
        };

        if self.cycle % HEADER_EVERY == 1 {
            let portfolio = self.ledger.portfolio();
            info!(
                cycle = self.cycle,
                capital = portfolio.capital,
                total_pnl = portfolio.total_pnl,
                closed_trades = portfolio.total_trades,
                open_positions = portfolio.position_count(),
                "cycle"
            );
        }

        let universe = resolve_universe(self.data, &self.settings.instruments);
        for instrument in &universe {
            match self.process_instrument(instrument) {
                Ok(outcome) => {
                    report.evaluated += 1;
                    match outcome {
                        InstrumentOutcome::Opened(_) => report.opened += 1,
                        InstrumentOutcome::Closed(_) => report.closed += 1,
                        InstrumentOutcome::Flat | InstrumentOutcome::Held => {}
                    }
                }
                Err(e) if e.is_transient() => {
                    report.skipped += 1;
                    warn!(instrument = %instrument, error = %e, "skipping instrument this cycle");
                }
                Err(e) => {
                    report.skipped += 1;
                    error!(instrument = %instrument, error = %e, "instrument evaluation failed");
                }
            }
        }

        if self.settings.snapshot_every > 0 && self.cycle % self.settings.snapshot_every == 0 {
            if let Err(e) = self.persist_snapshot() {
                error!(error = %e, "failed to persist portfolio snapshot");
            }
        }

        report
    }

    fn process_instrument(&mut self, instrument: &str) -> Result<InstrumentOutcome, TraderError> {
        let series = self
            .data
            .fetch_candles(instrument, &self.settings.candle_interval)?;
        let indicators = compute_indicators(&series)?;
        let score = classify(&indicators, self.settings.min_confirmations);
        let price = indicators.price;
        let now = self.clock.now();
        self.last_prices.insert(instrument.to_string(), price);

        debug!(
            instrument = %instrument,
            price,
            rsi = indicators.rsi,
            bull = score.bull_score,
            bear = score.bear_score,
            signal = %score.signal,
            "scored"
        );

        if self.ledger.has_position(instrument) {
            let Some(reason) = self.ledger.evaluate_exit(instrument, price, now) else {
                return Ok(InstrumentOutcome::Held);
            };
            if let Some(trade) = self.ledger.close(instrument, price, now, reason) {
                self.record_close(&trade);
            }
            return Ok(InstrumentOutcome::Closed(reason));
        }

        let Some(side) = Side::from_signal(score.signal) else {
            return Ok(InstrumentOutcome::Flat);
        };

        match self
            .ledger
            .open(instrument, side, price, now, indicators, score)?
        {
            Some(position) => {
                info!(
                    instrument = %instrument,
                    side = %side,
                    price,
                    units = position.units,
                    notional = position.notional,
                    bull = score.bull_score,
                    bear = score.bear_score,
                    "position opened"
                );
                if let Err(e) =
                    self.sink
                        .append_trade_open(position, &position.entry_indicators, &score)
                {
                    error!(instrument = %instrument, error = %e, "failed to record opened trade");
                }
                Ok(InstrumentOutcome::Opened(side))
            }
            None => {
                warn!(
                    instrument = %instrument,
                    capital = self.ledger.portfolio().capital,
                    "position size is zero, not opening"
                );
                Ok(InstrumentOutcome::Flat)
            }
        }
    }

    fn record_close(&self, trade: &ClosedTrade) {
        let portfolio = self.ledger.portfolio();
        info!(
            instrument = %trade.instrument,
            side = %trade.side,
            entry = trade.entry_price,
            exit = trade.exit_price,
            pnl = trade.pnl,
            pnl_pct = trade.pnl_fraction * 100.0,
            duration_mins = trade.duration_minutes(),
            reason = %trade.reason,
            capital = portfolio.capital,
            win_rate = portfolio.win_rate(),
            "position closed"
        );
        if let Err(e) = self.sink.finalize_trade_close(trade) {
            error!(instrument = %trade.instrument, error = %e, "failed to record closed trade");
        }
    }

    fn persist_snapshot(&self) -> Result<PortfolioSnapshot, TraderError> {
        let snapshot = self.ledger.snapshot(self.clock.now());
        self.sink.append_portfolio_snapshot(&snapshot)?;
        Ok(snapshot)
    }

    /// Poll until `stop` is set, then drain.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<PortfolioSnapshot, TraderError> {
        self.run_loop(stop, None)
    }

    /// Poll for at most `cycles` cycles (or until `stop`), then drain.
    pub fn run_for(
        &mut self,
        cycles: u64,
        stop: &AtomicBool,
    ) -> Result<PortfolioSnapshot, TraderError> {
        self.run_loop(stop, Some(cycles))
    }

    fn run_loop(
        &mut self,
        stop: &AtomicBool,
        limit: Option<u64>,
    ) -> Result<PortfolioSnapshot, TraderError> {
        info!(
            instruments = ?self.settings.instruments,
            interval = %self.settings.candle_interval,
            loop_secs = self.settings.loop_interval.as_secs(),
            min_confirmations = self.settings.min_confirmations,
            "starting trading loop"
        );

        let mut completed = 0u64;
        while !stop.load(Ordering::SeqCst) {
            self.run_cycle();
            completed += 1;
            if limit.is_some_and(|max| completed >= max) {
                break;
            }
            self.sleep_unless_stopped(stop);
        }

        self.shutdown()
    }

    fn sleep_unless_stopped(&self, stop: &AtomicBool) {
        let mut remaining = self.settings.loop_interval;
        while !remaining.is_zero() && !stop.load(Ordering::SeqCst) {
            let step = remaining.min(SLEEP_SLICE);
            self.clock.sleep(step);
            remaining -= step;
        }
    }

    /// Optionally force-close every position, then persist a final snapshot.
    pub fn shutdown(&mut self) -> Result<PortfolioSnapshot, TraderError> {
        if self.settings.close_on_shutdown {
            let now = self.clock.now();
            let trades = self
                .ledger
                .close_all(&self.last_prices, now, ExitReason::ManualStop);
            info!(closed = trades.len(), "closing open positions on shutdown");
            for trade in &trades {
                self.record_close(trade);
            }
        } else if self.ledger.portfolio().position_count() > 0 {
            info!(
                open = ?self.ledger.open_instruments(),
                "leaving positions open on shutdown"
            );
        }

        let snapshot = self.persist_snapshot()?;
        info!(
            capital = snapshot.capital,
            total_pnl = snapshot.total_pnl,
            trades = snapshot.total_trades,
            win_rate = snapshot.win_rate,
            "final snapshot saved"
        );
        Ok(snapshot)
    }
}
