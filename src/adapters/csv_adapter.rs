//! CSV replay data source.
//!
//! Reads `<dir>/<INSTRUMENT>.csv` with a `timestamp,open,high,low,close,volume`
//! header. Timestamps are epoch milliseconds or RFC 3339. Each fetch returns
//! the bars stamped at or before the shared clock's current time, so pairing
//! this source with a [`ManualClock`](crate::domain::clock::ManualClock)
//! replays history through the live engine.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::domain::clock::Clock;
use crate::domain::error::TraderError;
use crate::domain::ohlcv::{MAX_BARS, MIN_BARS, OhlcvBar, PriceSeries};
use crate::ports::data_port::MarketDataPort;

pub struct CsvReplaySource<'a> {
    clock: &'a dyn Clock,
    bars: HashMap<String, Vec<OhlcvBar>>,
}

impl<'a> CsvReplaySource<'a> {
    /// Load every instrument that has a file under `base_path`. Missing files
    /// are skipped; malformed ones are an error.
    pub fn load(
        base_path: &Path,
        instruments: &[String],
        clock: &'a dyn Clock,
    ) -> Result<Self, TraderError> {
        let mut bars = HashMap::new();
        for instrument in instruments {
            let path = csv_path(base_path, instrument);
            if !path.exists() {
                warn!(instrument = %instrument, path = %path.display(), "no replay file");
                continue;
            }
            let series = read_bars(&path, instrument)?;
            info!(instrument = %instrument, bars = series.len(), "loaded replay data");
            bars.insert(instrument.clone(), series);
        }
        Ok(Self { clock, bars })
    }

    /// First instant at which some instrument has enough history, and the
    /// last bar time across all instruments.
    pub fn replay_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self
            .bars
            .values()
            .filter_map(|b| b.get(MIN_BARS - 1))
            .map(|b| b.timestamp)
            .min()?;
        let end = self
            .bars
            .values()
            .filter_map(|b| b.last())
            .map(|b| b.timestamp)
            .max()?;
        Some((start, end))
    }
}

fn csv_path(base_path: &Path, instrument: &str) -> PathBuf {
    base_path.join(format!("{instrument}.csv"))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn read_bars(path: &Path, instrument: &str) -> Result<Vec<OhlcvBar>, TraderError> {
    let malformed = |reason: String| TraderError::Unavailable {
        instrument: instrument.to_string(),
        reason: format!("{}: {reason}", path.display()),
    };

    let content = fs::read_to_string(path)?;
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| malformed(format!("CSV parse error: {e}")))?;
        let field = |idx: usize, name: &str| -> Result<f64, TraderError> {
            record
                .get(idx)
                .ok_or_else(|| malformed(format!("row {}: missing {name} column", line + 1)))?
                .trim()
                .parse()
                .map_err(|e| malformed(format!("row {}: invalid {name} value: {e}", line + 1)))
        };

        let raw_ts = record
            .get(0)
            .ok_or_else(|| malformed(format!("row {}: missing timestamp column", line + 1)))?;
        let timestamp = parse_timestamp(raw_ts)
            .ok_or_else(|| malformed(format!("row {}: invalid timestamp '{raw_ts}'", line + 1)))?;

        bars.push(OhlcvBar {
            timestamp,
            open: field(1, "open")?,
            high: field(2, "high")?,
            low: field(3, "low")?,
            close: field(4, "close")?,
            volume: field(5, "volume")?,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

impl MarketDataPort for CsvReplaySource<'_> {
    fn fetch_candles(&self, instrument: &str, _interval: &str) -> Result<PriceSeries, TraderError> {
        let bars = self
            .bars
            .get(instrument)
            .ok_or_else(|| TraderError::Unavailable {
                instrument: instrument.to_string(),
                reason: "no replay data".into(),
            })?;

        let now = self.clock.now();
        let visible = bars.partition_point(|b| b.timestamp <= now);
        let from = visible.saturating_sub(MAX_BARS);
        PriceSeries::new(instrument, bars[from..visible].to_vec())
    }

    fn list_tradable_instruments(&self) -> Result<HashSet<String>, TraderError> {
        Ok(self.bars.keys().cloned().collect())
    }
}
