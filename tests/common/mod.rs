#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use papertrader::domain::clock::{Clock, ManualClock};
use papertrader::domain::config::TradingSettings;
use papertrader::domain::error::TraderError;
use papertrader::domain::exit_policy::ExitPolicy;
use papertrader::domain::indicator::IndicatorVector;
use papertrader::domain::ledger::PositionLedger;
pub use papertrader::domain::ohlcv::OhlcvBar;
use papertrader::domain::ohlcv::{MAX_BARS, PriceSeries};
use papertrader::domain::portfolio::PortfolioSnapshot;
use papertrader::domain::position::{ClosedTrade, Position};
use papertrader::domain::signal::SignalScore;
use papertrader::domain::sizing::SizingParams;
use papertrader::ports::data_port::MarketDataPort;
use papertrader::ports::trade_sink::{TradeRecord, TradeSink};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::Write;

pub const BAR_MINUTES: i64 = 5;
/// Bars of history before the first tick.
pub const WARMUP: usize = 80;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

pub fn bar_time(i: usize) -> DateTime<Utc> {
    t0() + Duration::minutes(BAR_MINUTES * i as i64)
}

/// Time of the first tick: the last warmup bar has just closed.
pub fn first_tick() -> DateTime<Utc> {
    bar_time(WARMUP - 1)
}

/// Half the high-low range of every generated bar. Wide enough that a steady
/// ramp keeps %K clear of the oversold and overbought bands, so a ramp scores
/// exactly two confirmations (EMA cross and MACD) on its own side.
pub const HALF_RANGE: f64 = 7.0;

pub fn make_bar(i: usize, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp: bar_time(i),
        open: close,
        high: close + HALF_RANGE,
        low: close - HALF_RANGE,
        close,
        volume: 1000.0,
    }
}

/// `count` closes starting at `start`, moving `step` per bar.
pub fn ramp(start: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + step * i as f64).collect()
}

/// Warmup ramp followed by `tail`. The warmup ends at 179 going up or 121
/// going down, so the first tick enters there.
pub fn uptrend_then(tail: &[f64]) -> Vec<f64> {
    let mut closes = ramp(100.0, 1.0, WARMUP);
    closes.extend_from_slice(tail);
    closes
}

pub fn downtrend_then(tail: &[f64]) -> Vec<f64> {
    let mut closes = ramp(200.0, -1.0, WARMUP);
    closes.extend_from_slice(tail);
    closes
}

/// Market whose bars become visible as the shared clock reaches them.
pub struct ScriptedMarket<'a> {
    clock: &'a dyn Clock,
    bars: HashMap<String, Vec<OhlcvBar>>,
    unavailable: HashSet<String>,
}

impl<'a> ScriptedMarket<'a> {
    pub fn new(clock: &'a dyn Clock) -> Self {
        Self {
            clock,
            bars: HashMap::new(),
            unavailable: HashSet::new(),
        }
    }

    pub fn with_closes(mut self, instrument: &str, closes: &[f64]) -> Self {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| make_bar(i, c))
            .collect();
        self.bars.insert(instrument.to_string(), bars);
        self
    }

    pub fn with_outage(mut self, instrument: &str) -> Self {
        self.unavailable.insert(instrument.to_string());
        self
    }
}

impl MarketDataPort for ScriptedMarket<'_> {
    fn fetch_candles(&self, instrument: &str, _interval: &str) -> Result<PriceSeries, TraderError> {
        if self.unavailable.contains(instrument) {
            return Err(TraderError::Unavailable {
                instrument: instrument.to_string(),
                reason: "scripted outage".into(),
            });
        }
        let bars = self
            .bars
            .get(instrument)
            .ok_or_else(|| TraderError::Unavailable {
                instrument: instrument.to_string(),
                reason: "unknown instrument".into(),
            })?;
        let now = self.clock.now();
        let visible = bars.partition_point(|b| b.timestamp <= now);
        PriceSeries::new(instrument, bars[visible.saturating_sub(MAX_BARS)..visible].to_vec())
    }

    fn list_tradable_instruments(&self) -> Result<HashSet<String>, TraderError> {
        Ok(self.bars.keys().cloned().collect())
    }
}

/// In-memory sink that records every call.
#[derive(Default)]
pub struct RecordingSink {
    pub opens: RefCell<Vec<(Position, SignalScore)>>,
    pub closes: RefCell<Vec<ClosedTrade>>,
    pub snapshots: RefCell<Vec<PortfolioSnapshot>>,
    pub fail_writes: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), TraderError> {
        if self.fail_writes {
            Err(TraderError::Database {
                reason: "disk full".into(),
            })
        } else {
            Ok(())
        }
    }
}

impl TradeSink for RecordingSink {
    fn append_trade_open(
        &self,
        position: &Position,
        _indicators: &IndicatorVector,
        score: &SignalScore,
    ) -> Result<(), TraderError> {
        self.check()?;
        self.opens.borrow_mut().push((position.clone(), *score));
        Ok(())
    }

    fn finalize_trade_close(&self, trade: &ClosedTrade) -> Result<(), TraderError> {
        self.check()?;
        self.closes.borrow_mut().push(trade.clone());
        Ok(())
    }

    fn append_portfolio_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<(), TraderError> {
        self.check()?;
        self.snapshots.borrow_mut().push(snapshot.clone());
        Ok(())
    }

    fn query_closed_trades(&self) -> Result<Vec<TradeRecord>, TraderError> {
        Ok(Vec::new())
    }
}

pub fn manual_clock() -> ManualClock {
    ManualClock::new(first_tick())
}

/// Settings stepping one bar per cycle.
pub fn settings(instruments: &[&str], min_confirmations: u8) -> TradingSettings {
    TradingSettings {
        instruments: instruments.iter().map(|s| s.to_string()).collect(),
        initial_capital: 1000.0,
        min_confirmations,
        loop_interval: std::time::Duration::from_secs(BAR_MINUTES as u64 * 60),
        candle_interval: "5m".into(),
        snapshot_every: 10,
        close_on_shutdown: false,
    }
}

pub fn ledger() -> PositionLedger {
    PositionLedger::new(1000.0, SizingParams::default(), ExitPolicy::default())
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Write `closes` as `<dir>/<instrument>.csv` with epoch-millisecond stamps.
pub fn write_csv(dir: &std::path::Path, instrument: &str, closes: &[f64]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for (i, &c) in closes.iter().enumerate() {
        let bar = make_bar(i, c);
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.timestamp.timestamp_millis(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    std::fs::write(dir.join(format!("{instrument}.csv")), content).unwrap();
}
