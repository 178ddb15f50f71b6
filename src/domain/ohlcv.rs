//! OHLCV bar and validated price series.

use chrono::{DateTime, Duration, Utc};

use super::error::TraderError;

/// Minimum number of bars required for a valid indicator vector.
pub const MIN_BARS: usize = 50;

/// Number of most recent bars retained per series.
pub const MAX_BARS: usize = 300;

/// Length of one candle for an interval label such as `5m`, `1h` or `1d`.
/// `None` for unknown units, non-positive counts and lengths chrono cannot
/// represent.
pub fn interval_length(interval: &str) -> Option<Duration> {
    let unit = interval.chars().last()?;
    let count = &interval[..interval.len() - unit.len_utf8()];
    let count: i64 = count.parse().ok().filter(|n| *n > 0)?;
    match unit {
        'm' => Duration::try_minutes(count),
        'h' => Duration::try_hours(count),
        'd' => Duration::try_days(count),
        'w' => Duration::try_weeks(count),
        _ => None,
    }
}

/// Time covered by a full [`MAX_BARS`] series at `interval`.
pub fn history_span(interval: &str) -> Option<Duration> {
    interval_length(interval)?.checked_mul(MAX_BARS as i32)
}

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// (high + low) / 2
    pub fn median_price(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    fn is_well_formed(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.volume.is_finite()
            && self.volume >= 0.0
    }
}

/// Ordered bars for one instrument, strictly increasing in time.
///
/// Construction keeps only the most recent [`MAX_BARS`] bars. A series may
/// hold fewer than [`MIN_BARS`]; the indicator engine rejects it then.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    instrument: String,
    bars: Vec<OhlcvBar>,
}

impl PriceSeries {
    pub fn new(
        instrument: impl Into<String>,
        mut bars: Vec<OhlcvBar>,
    ) -> Result<Self, TraderError> {
        let instrument = instrument.into();

        if let Some(bad) = bars.iter().position(|b| !b.is_well_formed()) {
            return Err(TraderError::Unavailable {
                instrument,
                reason: format!("malformed bar at index {bad}"),
            });
        }

        if let Some(pair) = bars.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(TraderError::Unavailable {
                instrument,
                reason: format!("timestamps not strictly increasing at {}", pair[1].timestamp),
            });
        }

        if bars.len() > MAX_BARS {
            bars.drain(..bars.len() - MAX_BARS);
        }

        Ok(Self { instrument, bars })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&OhlcvBar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}
