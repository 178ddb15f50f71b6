//! Change-based indicators: Rate of Change, momentum and return volatility.
//!
//! ROC(n)[i] = (C[i] - C[i-n]) / C[i-n] × 100
//! Momentum(n)[i] = C[i] - C[i-n]
//! Volatility(n)[i] = sample StdDev of the last n bar returns × 100
//!
//! Warmup: first n bars are undefined for ROC and momentum, n for volatility.

use super::rolling::rolling_std;

pub fn calculate_roc(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    lagged(closes, period, |current, past| (current - past) / past * 100.0)
}

pub fn calculate_momentum(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    lagged(closes, period, |current, past| current - past)
}

pub fn calculate_volatility(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let returns = calculate_roc(closes, 1)
        .into_iter()
        .map(|r| r.map(|pct| pct / 100.0))
        .collect::<Vec<_>>();
    rolling_std(&returns, period)
        .into_iter()
        .map(|sd| sd.map(|sd| sd * 100.0))
        .collect()
}

fn lagged<F>(closes: &[f64], period: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(f64, f64) -> f64,
{
    closes
        .iter()
        .enumerate()
        .map(|(i, &current)| {
            if period == 0 || i < period {
                None
            } else {
                Some(f(current, closes[i - period]))
            }
        })
        .collect()
}
