//! SuperTrend, computed as a sequential scan over the bars.
//!
//! Bands: HL2 ± multiplier × ATR(period).
//! For each bar i ≥ 1, compared against the *previous* bar's bands:
//!   C[i] > upper[i-1] → value = lower[i], direction = +1
//!   C[i] < lower[i-1] → value = upper[i], direction = -1
//!   otherwise value and direction carry forward unchanged.
//! Until the first breach the direction is 0 and the value is `None`.

use super::atr::calculate_atr;
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 14;
pub const DEFAULT_MULTIPLIER: f64 = 3.0;

pub const DIRECTION_UP: i8 = 1;
pub const DIRECTION_DOWN: i8 = -1;
pub const DIRECTION_UNSET: i8 = 0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuperTrendPoint {
    pub value: Option<f64>,
    pub direction: i8,
    pub upper: Option<f64>,
    pub lower: Option<f64>,
}

pub fn calculate_supertrend(
    bars: &[OhlcvBar],
    period: usize,
    multiplier: f64,
) -> Vec<SuperTrendPoint> {
    let atr = calculate_atr(bars, period);
    let bands: Vec<(Option<f64>, Option<f64>)> = bars
        .iter()
        .zip(&atr)
        .map(|(bar, atr)| {
            let hl2 = bar.median_price();
            (
                atr.map(|a| hl2 + multiplier * a),
                atr.map(|a| hl2 - multiplier * a),
            )
        })
        .collect();

    let mut out: Vec<SuperTrendPoint> = Vec::with_capacity(bars.len());
    let mut value = None;
    let mut direction = DIRECTION_UNSET;

    for (i, bar) in bars.iter().enumerate() {
        let (upper, lower) = bands[i];

        if i > 0 {
            let (prev_upper, prev_lower) = bands[i - 1];
            if prev_upper.is_some_and(|band| bar.close > band) {
                value = lower;
                direction = DIRECTION_UP;
            } else if prev_lower.is_some_and(|band| bar.close < band) {
                value = upper;
                direction = DIRECTION_DOWN;
            }
        }

        out.push(SuperTrendPoint {
            value,
            direction,
            upper,
            lower,
        });
    }

    out
}
