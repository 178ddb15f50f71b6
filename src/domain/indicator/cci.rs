//! Commodity Channel Index.
//!
//! TP = (H + L + C) / 3
//! CCI = (TP - SMA(TP, n)) / (0.015 × StdDev(TP, n) + ε), sample StdDev.

use super::EPSILON;
use super::rolling::{defined, rolling_mean, rolling_std};
use crate::domain::ohlcv::OhlcvBar;

const LAMBERT_CONSTANT: f64 = 0.015;

pub fn calculate_cci(bars: &[OhlcvBar], period: usize) -> Vec<Option<f64>> {
    let typical: Vec<f64> = bars.iter().map(OhlcvBar::typical_price).collect();
    let mean = rolling_mean(&defined(&typical), period);
    let stddev = rolling_std(&defined(&typical), period);

    typical
        .iter()
        .enumerate()
        .map(|(i, tp)| Some((tp - mean[i]?) / (LAMBERT_CONSTANT * stddev[i]? + EPSILON)))
        .collect()
}
