//! Exponential Moving Average, unadjusted recursive form.
//!
//! α = 2/(span+1), EMA[0] = X[0], then EMA[i] = X[i]*α + EMA[i-1]*(1-α).
//! Defined from the first bar; no warmup.

pub fn calculate_ema(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || values.is_empty() {
        return Vec::new();
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut ema = values[0];
    out.push(ema);

    for &value in &values[1..] {
        ema = value * alpha + ema * (1.0 - alpha);
        out.push(ema);
    }

    out
}
