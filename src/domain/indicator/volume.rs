//! Volume-weighted indicators: OBV, VWAP and the relative volume ratio.
//!
//! OBV[i] = Σ_{j=1..i} V[j] × sign(C[j] - C[j-1]), sign(0) = 0, OBV[0] = 0.
//! VWAP[i] = Σ V×TP / (Σ V + ε), cumulative from the first retained bar.
//! Volume ratio = V[i] / (SMA(V, n) + ε).

use super::EPSILON;
use super::rolling::{defined, rolling_mean};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_obv(bars: &[OhlcvBar]) -> Vec<f64> {
    let mut out = Vec::with_capacity(bars.len());
    let mut obv = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i > 0 {
            let prev = bars[i - 1].close;
            if bar.close > prev {
                obv += bar.volume;
            } else if bar.close < prev {
                obv -= bar.volume;
            }
        }
        out.push(obv);
    }

    out
}

pub fn calculate_vwap(bars: &[OhlcvBar]) -> Vec<f64> {
    let mut out = Vec::with_capacity(bars.len());
    let mut weighted = 0.0;
    let mut volume = 0.0;

    for bar in bars {
        weighted += bar.volume * bar.typical_price();
        volume += bar.volume;
        out.push(weighted / (volume + EPSILON));
    }

    out
}

pub fn calculate_volume_ratio(bars: &[OhlcvBar], period: usize) -> Vec<Option<f64>> {
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let average = rolling_mean(&defined(&volumes), period);

    volumes
        .iter()
        .zip(&average)
        .map(|(v, avg)| Some(v / ((*avg)? + EPSILON)))
        .collect()
}
