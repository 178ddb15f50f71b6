//! Stochastic oscillator and Williams %R.
//!
//! %K = 100 * (C - LL(n)) / (HH(n) - LL(n) + ε), %D = SMA(d) of %K.
//! %R = -100 * (HH(n) - C) / (HH(n) - LL(n) + ε).

use super::EPSILON;
use super::rolling::{defined, rolling_max, rolling_mean, rolling_min};
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticPoint {
    pub k: f64,
    pub d: f64,
}

struct Range {
    lowest: Vec<Option<f64>>,
    highest: Vec<Option<f64>>,
}

fn range(bars: &[OhlcvBar], period: usize) -> Range {
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    Range {
        lowest: rolling_min(&defined(&lows), period),
        highest: rolling_max(&defined(&highs), period),
    }
}

pub fn calculate_stochastic(
    bars: &[OhlcvBar],
    k_period: usize,
    d_period: usize,
) -> Vec<Option<StochasticPoint>> {
    let Range { lowest, highest } = range(bars, k_period);

    let k: Vec<Option<f64>> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let (lo, hi) = (lowest[i]?, highest[i]?);
            Some(100.0 * (bar.close - lo) / (hi - lo + EPSILON))
        })
        .collect();
    let d = rolling_mean(&k, d_period);

    k.iter()
        .zip(&d)
        .map(|(k, d)| Some(StochasticPoint { k: (*k)?, d: (*d)? }))
        .collect()
}

pub fn calculate_williams_r(bars: &[OhlcvBar], period: usize) -> Vec<Option<f64>> {
    let Range { lowest, highest } = range(bars, period);

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let (lo, hi) = (lowest[i]?, highest[i]?);
            Some(-100.0 * (hi - bar.close) / (hi - lo + EPSILON))
        })
        .collect()
}
