//! Bollinger Bands.
//!
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//! - Width: (Upper - Lower) / Middle × 100
//!
//! StdDev is the sample standard deviation (divides by N-1).
//! Warmup: first (period-1) bars are undefined.

use super::rolling::{defined, rolling_mean, rolling_std};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerPoint {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
}

pub fn calculate_bollinger(
    closes: &[f64],
    period: usize,
    multiplier: f64,
) -> Vec<Option<BollingerPoint>> {
    let closes = defined(closes);
    let middle = rolling_mean(&closes, period);
    let stddev = rolling_std(&closes, period);

    middle
        .iter()
        .zip(&stddev)
        .map(|(middle, stddev)| {
            let (middle, stddev) = ((*middle)?, (*stddev)?);
            let upper = middle + multiplier * stddev;
            let lower = middle - multiplier * stddev;
            Some(BollingerPoint {
                upper,
                middle,
                lower,
                width: (upper - lower) / middle * 100.0,
            })
        })
        .collect()
}
