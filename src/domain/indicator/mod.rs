//! Technical indicator pipeline.
//!
//! Each submodule computes one indicator family as a series aligned with the
//! input bars. [`compute_indicators`] evaluates all of them on a
//! [`PriceSeries`] and keeps the values at the most recent bar as a
//! fixed-shape [`IndicatorVector`].

pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod ema;
pub mod macd;
pub mod roc;
pub mod rolling;
pub mod rsi;
pub mod stochastic;
pub mod supertrend;
pub mod volume;

use chrono::{DateTime, Utc};
use std::fmt;

use crate::domain::error::TraderError;
use crate::domain::ohlcv::{MIN_BARS, PriceSeries};

/// Floor added to denominators that can vanish.
pub const EPSILON: f64 = 1e-10;

pub const RSI_PERIOD: usize = 14;
pub const EMA_SPANS: [usize; 4] = [8, 21, 50, 200];
pub const STOCH_K_PERIOD: usize = 14;
pub const STOCH_D_PERIOD: usize = 3;
pub const ATR_PERIOD: usize = 14;
pub const ADX_PERIOD: usize = 14;
pub const CCI_PERIOD: usize = 20;
pub const ROC_PERIOD: usize = 10;
pub const WILLIAMS_PERIOD: usize = 14;
pub const VOLUME_PERIOD: usize = 20;
pub const VOLATILITY_PERIOD: usize = 20;
pub const MOMENTUM_PERIOD: usize = 10;

/// Categorical trend label derived from a pair of EMAs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    /// `Up` when the faster average is strictly above the slower one.
    pub fn from_emas(fast: f64, slow: f64) -> Self {
        if fast > slow { Trend::Up } else { Trend::Down }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "UP",
            Trend::Down => "DOWN",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Indicator values at the most recent bar of one price series.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorVector {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub rsi: f64,
    pub ema8: f64,
    pub ema21: f64,
    pub ema50: f64,
    pub ema200: f64,
    pub price_vs_ema8: f64,
    pub price_vs_ema21: f64,
    pub price_vs_ema50: f64,
    pub price_vs_ema200: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub bb_width: f64,
    pub atr: f64,
    pub adx: f64,
    pub cci: f64,
    pub roc: f64,
    pub williams_r: f64,
    pub obv: f64,
    pub vwap: f64,
    pub price_vs_vwap: f64,
    pub volume_ratio: f64,
    pub volatility: f64,
    pub momentum: f64,
    pub supertrend: Option<f64>,
    pub supertrend_dir: i8,
    pub trend_short: Trend,
    pub trend_medium: Trend,
    pub trend_long: Trend,
}

impl IndicatorVector {
    /// Numeric fields by column name, in a stable order.
    ///
    /// `supertrend` is omitted because it can be absent; `supertrend_dir`
    /// and the trend labels are categorical.
    pub fn numeric_fields(&self) -> [(&'static str, f64); 30] {
        [
            ("price", self.price),
            ("rsi", self.rsi),
            ("ema8", self.ema8),
            ("ema21", self.ema21),
            ("ema50", self.ema50),
            ("ema200", self.ema200),
            ("price_vs_ema8", self.price_vs_ema8),
            ("price_vs_ema21", self.price_vs_ema21),
            ("price_vs_ema50", self.price_vs_ema50),
            ("price_vs_ema200", self.price_vs_ema200),
            ("macd", self.macd),
            ("macd_signal", self.macd_signal),
            ("macd_histogram", self.macd_histogram),
            ("stoch_k", self.stoch_k),
            ("stoch_d", self.stoch_d),
            ("bb_upper", self.bb_upper),
            ("bb_middle", self.bb_middle),
            ("bb_lower", self.bb_lower),
            ("bb_width", self.bb_width),
            ("atr", self.atr),
            ("adx", self.adx),
            ("cci", self.cci),
            ("roc", self.roc),
            ("williams_r", self.williams_r),
            ("obv", self.obv),
            ("vwap", self.vwap),
            ("price_vs_vwap", self.price_vs_vwap),
            ("volume_ratio", self.volume_ratio),
            ("volatility", self.volatility),
            ("momentum", self.momentum),
        ]
    }
}

#[cfg(test)]
impl IndicatorVector {
    /// Oscillators at their midpoints and averages at `price`. Neither bull
    /// nor bear conditions fire on this vector.
    pub(crate) fn neutral(timestamp: DateTime<Utc>, price: f64) -> Self {
        IndicatorVector {
            timestamp,
            price,
            rsi: 50.0,
            ema8: price,
            ema21: price,
            ema50: price,
            ema200: price,
            price_vs_ema8: 0.0,
            price_vs_ema21: 0.0,
            price_vs_ema50: 0.0,
            price_vs_ema200: 0.0,
            macd: 0.0,
            macd_signal: 0.0,
            macd_histogram: 0.0,
            stoch_k: 50.0,
            stoch_d: 50.0,
            bb_upper: price * 1.05,
            bb_middle: price,
            bb_lower: price * 0.95,
            bb_width: price * 0.1,
            atr: price * 0.01,
            adx: 20.0,
            cci: 0.0,
            roc: 0.0,
            williams_r: -50.0,
            obv: 0.0,
            vwap: price,
            price_vs_vwap: 0.0,
            volume_ratio: 1.0,
            volatility: 1.0,
            momentum: 0.0,
            supertrend: None,
            supertrend_dir: supertrend::DIRECTION_UNSET,
            trend_short: Trend::Down,
            trend_medium: Trend::Down,
            trend_long: Trend::Down,
        }
    }
}

fn percent_offset(price: f64, reference: f64) -> f64 {
    (price - reference) / (reference + EPSILON) * 100.0
}

/// Compute every indicator on `series` and return the values at its last bar.
///
/// Fails with [`TraderError::InsufficientData`] when the series is shorter
/// than [`MIN_BARS`] or a windowed value is still undefined at the last bar.
pub fn compute_indicators(series: &PriceSeries) -> Result<IndicatorVector, TraderError> {
    let bars = series.bars();
    let insufficient = || TraderError::InsufficientData {
        instrument: series.instrument().to_string(),
        bars: bars.len(),
        minimum: MIN_BARS,
    };

    let last_bar = match bars.last() {
        Some(bar) if bars.len() >= MIN_BARS => bar,
        _ => return Err(insufficient()),
    };
    let last = bars.len() - 1;
    let closes = series.closes();
    let price = last_bar.close;

    let [ema8, ema21, ema50, ema200] =
        EMA_SPANS.map(|span| ema::calculate_ema(&closes, span)[last]);

    let macd = macd::calculate_macd_default(&closes)[last];
    let stoch = stochastic::calculate_stochastic(bars, STOCH_K_PERIOD, STOCH_D_PERIOD)[last]
        .ok_or_else(insufficient)?;
    let bands = bollinger::calculate_bollinger(
        &closes,
        bollinger::DEFAULT_PERIOD,
        bollinger::DEFAULT_MULTIPLIER,
    )[last]
        .ok_or_else(insufficient)?;
    let supertrend = supertrend::calculate_supertrend(
        bars,
        supertrend::DEFAULT_PERIOD,
        supertrend::DEFAULT_MULTIPLIER,
    )[last];

    let vwap = volume::calculate_vwap(bars)[last];
    let at_last = |values: Vec<Option<f64>>| values[last].ok_or_else(insufficient);

    Ok(IndicatorVector {
        timestamp: last_bar.timestamp,
        price,
        rsi: at_last(rsi::calculate_rsi(&closes, RSI_PERIOD))?,
        ema8,
        ema21,
        ema50,
        ema200,
        price_vs_ema8: percent_offset(price, ema8),
        price_vs_ema21: percent_offset(price, ema21),
        price_vs_ema50: percent_offset(price, ema50),
        price_vs_ema200: percent_offset(price, ema200),
        macd: macd.line,
        macd_signal: macd.signal,
        macd_histogram: macd.histogram,
        stoch_k: stoch.k,
        stoch_d: stoch.d,
        bb_upper: bands.upper,
        bb_middle: bands.middle,
        bb_lower: bands.lower,
        bb_width: bands.width,
        atr: at_last(atr::calculate_atr(bars, ATR_PERIOD))?,
        adx: at_last(atr::calculate_adx(bars, ADX_PERIOD))?,
        cci: at_last(cci::calculate_cci(bars, CCI_PERIOD))?,
        roc: at_last(roc::calculate_roc(&closes, ROC_PERIOD))?,
        williams_r: at_last(stochastic::calculate_williams_r(bars, WILLIAMS_PERIOD))?,
        obv: volume::calculate_obv(bars)[last],
        vwap,
        price_vs_vwap: percent_offset(price, vwap),
        volume_ratio: at_last(volume::calculate_volume_ratio(bars, VOLUME_PERIOD))?,
        volatility: at_last(roc::calculate_volatility(&closes, VOLATILITY_PERIOD))?,
        momentum: at_last(roc::calculate_momentum(&closes, MOMENTUM_PERIOD))?,
        supertrend: supertrend.value,
        supertrend_dir: supertrend.direction,
        trend_short: Trend::from_emas(ema8, ema21),
        trend_medium: Trend::from_emas(ema21, ema50),
        trend_long: Trend::from_emas(ema50, ema200),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn series_from(rows: &[(f64, f64, f64, f64)]) -> PriceSeries {
        let bars = rows
            .iter()
            .enumerate()
            .map(|(i, &(high, low, close, volume))| OhlcvBar {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64 * 300, 0).unwrap(),
                open: close,
                high,
                low,
                close,
                volume,
            })
            .collect();
        PriceSeries::new("TEST", bars).unwrap()
    }

    fn trending(count: usize, step: f64) -> PriceSeries {
        let rows: Vec<(f64, f64, f64, f64)> = (0..count)
            .map(|i| {
                let close = 100.0 + step * i as f64;
                (close + 0.5, close - 0.5, close, 1000.0 + i as f64)
            })
            .collect();
        series_from(&rows)
    }

    #[test]
    fn rejects_short_series() {
        let err = compute_indicators(&trending(49, 1.0)).unwrap_err();
        match err {
            TraderError::InsufficientData {
                instrument,
                bars,
                minimum,
            } => {
                assert_eq!(instrument, "TEST");
                assert_eq!(bars, 49);
                assert_eq!(minimum, MIN_BARS);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn accepts_minimum_length() {
        let ind = compute_indicators(&trending(MIN_BARS, 1.0)).unwrap();
        assert!((ind.price - 149.0).abs() < f64::EPSILON);
    }

    #[test]
    fn uptrend_labels_and_direction() {
        let ind = compute_indicators(&trending(120, 1.0)).unwrap();
        assert_eq!(ind.trend_short, Trend::Up);
        assert_eq!(ind.trend_medium, Trend::Up);
        assert_eq!(ind.trend_long, Trend::Up);
        assert!(ind.ema8 > ind.ema21);
        assert!(ind.macd > 0.0);
        assert!(ind.price_vs_ema8 > 0.0);
        assert!((ind.momentum - 10.0).abs() < 1e-9);
        assert!(ind.obv > 0.0);
    }

    #[test]
    fn downtrend_labels() {
        let ind = compute_indicators(&trending(120, -0.5)).unwrap();
        assert_eq!(ind.trend_short, Trend::Down);
        assert_eq!(ind.trend_long, Trend::Down);
        assert!(ind.rsi < 1e-6);
        assert!(ind.roc < 0.0);
    }

    #[test]
    fn flat_series_pins_epsilon_behavior() {
        let ind = compute_indicators(&series_from(&[(10.0, 10.0, 10.0, 0.0); 60])).unwrap();
        assert_eq!(ind.rsi, 0.0);
        assert_eq!(ind.stoch_k, 0.0);
        assert_eq!(ind.stoch_d, 0.0);
        assert_eq!(ind.cci, 0.0);
        assert_eq!(ind.adx, 0.0);
        assert_eq!(ind.vwap, 0.0);
        assert_eq!(ind.volume_ratio, 0.0);
        assert!(ind.williams_r.abs() < f64::EPSILON);
        // price vs a zero VWAP is floored, not infinite
        assert!((ind.price_vs_vwap - 10.0 / EPSILON * 100.0).abs() / ind.price_vs_vwap < 1e-12);
        assert_eq!(ind.supertrend_dir, supertrend::DIRECTION_UNSET);
        assert_eq!(ind.supertrend, None);
        assert_eq!(ind.trend_short, Trend::Down);
    }

    #[test]
    fn numeric_fields_are_in_column_order() {
        let ind = compute_indicators(&trending(60, 1.0)).unwrap();
        let fields = ind.numeric_fields();
        assert_eq!(fields[0], ("price", ind.price));
        assert_eq!(fields[1].0, "rsi");
        assert_eq!(fields[29], ("momentum", ind.momentum));
    }

    #[test]
    fn trend_display() {
        assert_eq!(Trend::Up.to_string(), "UP");
        assert_eq!(Trend::Down.to_string(), "DOWN");
        assert_eq!(Trend::from_emas(1.0, 1.0), Trend::Down);
    }

    fn arb_series() -> impl Strategy<Value = PriceSeries> {
        prop::collection::vec((-2.0f64..2.0, 0.0f64..1.5, 0.0f64..5000.0), 50..200).prop_map(
            |steps| {
                let mut close = 100.0;
                let rows: Vec<(f64, f64, f64, f64)> = steps
                    .iter()
                    .map(|&(delta, spread, volume)| {
                        close = (close + delta).max(1.0);
                        (close + spread, (close - spread).max(0.5), close, volume)
                    })
                    .collect();
                series_from(&rows)
            },
        )
    }

    proptest! {
        #[test]
        fn deterministic_and_finite(series in arb_series()) {
            let first = compute_indicators(&series).unwrap();
            let second = compute_indicators(&series).unwrap();
            prop_assert_eq!(&first, &second);

            for (name, value) in first.numeric_fields() {
                prop_assert!(value.is_finite(), "{} is not finite: {}", name, value);
            }
            prop_assert!((0.0..=100.0).contains(&first.rsi));
            prop_assert!(first.supertrend_dir.abs() <= 1);
        }
    }
}
