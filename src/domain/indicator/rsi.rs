//! RSI (Relative Strength Index) over simple rolling means.
//!
//! gain/loss are n-bar simple means of the positive/negative close changes.
//! RS = gain / (loss + ε), RSI = 100 - 100 / (1 + RS).
//! The first change needs two bars, so RSI is defined from bar `period`.

use super::EPSILON;
use super::rolling::rolling_mean;

pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut gains = vec![None; closes.len()];
    let mut losses = vec![None; closes.len()];

    for i in 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        gains[i] = Some(change.max(0.0));
        losses[i] = Some((-change).max(0.0));
    }

    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(gain, loss)| {
            let (gain, loss) = ((*gain)?, (*loss)?);
            let rs = gain / (loss + EPSILON);
            Some(100.0 - 100.0 / (1.0 + rs))
        })
        .collect()
}
