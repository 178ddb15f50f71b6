//! True range, ATR and ADX.
//!
//! TR[0] = H - L, TR[i] = max(H-L, |H-C[i-1]|, |L-C[i-1]|).
//! ATR(n) is the n-bar simple mean of TR.
//!
//! ADX(n):
//!   +DM = max(H[i] - H[i-1], 0), -DM = max(L[i-1] - L[i], 0)
//!   +DI = 100 * Σn(+DM) / (Σn(TR) + ε), -DI likewise
//!   DX  = 100 * |+DI - -DI| / (+DI + -DI + ε)
//!   ADX = n-bar simple mean of DX

use super::EPSILON;
use super::rolling::{defined, rolling_mean, rolling_sum};
use crate::domain::ohlcv::OhlcvBar;

pub fn true_range(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

pub fn calculate_atr(bars: &[OhlcvBar], period: usize) -> Vec<Option<f64>> {
    rolling_mean(&defined(&true_range(bars)), period)
}

pub fn calculate_adx(bars: &[OhlcvBar], period: usize) -> Vec<Option<f64>> {
    let mut plus_dm = vec![None; bars.len()];
    let mut minus_dm = vec![None; bars.len()];
    for i in 1..bars.len() {
        plus_dm[i] = Some((bars[i].high - bars[i - 1].high).max(0.0));
        minus_dm[i] = Some((bars[i - 1].low - bars[i].low).max(0.0));
    }

    let tr_sum = rolling_sum(&defined(&true_range(bars)), period);
    let plus_sum = rolling_sum(&plus_dm, period);
    let minus_sum = rolling_sum(&minus_dm, period);

    let dx: Vec<Option<f64>> = (0..bars.len())
        .map(|i| {
            let tr = tr_sum[i]? + EPSILON;
            let plus_di = 100.0 * plus_sum[i]? / tr;
            let minus_di = 100.0 * minus_sum[i]? / tr;
            Some(100.0 * (plus_di - minus_di).abs() / (plus_di + minus_di + EPSILON))
        })
        .collect();

    rolling_mean(&dx, period)
}
