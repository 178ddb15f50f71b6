//! Fixed-window rolling reductions.
//!
//! Every output is aligned with its input: `out[i]` covers `input[i+1-period..=i]`
//! and is `None` until a full window of defined values is available.

/// Lift a dense series into the optional form the window functions take.
pub fn defined(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(Some).collect()
}

fn rolling<F>(values: &[Option<f64>], period: usize, reduce: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    let mut window = Vec::with_capacity(period);
    for i in (period - 1)..values.len() {
        window.clear();
        window.extend(values[i + 1 - period..=i].iter().map_while(|v| *v));
        if window.len() == period {
            out[i] = Some(reduce(&window));
        }
    }
    out
}

pub fn rolling_sum(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().sum())
}

pub fn rolling_mean(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().sum::<f64>() / w.len() as f64)
}

pub fn rolling_min(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

pub fn rolling_max(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |w| {
        w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

/// Sample standard deviation (divides by n - 1). Undefined for period < 2.
pub fn rolling_std(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    if period < 2 {
        return vec![None; values.len()];
    }
    rolling(values, period, |w| {
        let n = w.len() as f64;
        let mean = w.iter().sum::<f64>() / n;
        let variance = w
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / (n - 1.0);
        variance.sqrt()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_warmup_and_values() {
        let out = rolling_mean(&defined(&[1.0, 2.0, 3.0, 4.0]), 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert!((out[2].unwrap() - 2.0).abs() < f64::EPSILON);
        assert!((out[3].unwrap() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn window_with_gap_is_undefined() {
        let values = vec![None, Some(2.0), Some(3.0), Some(4.0)];
        let out = rolling_sum(&values, 3);
        assert_eq!(out[2], None);
        assert!((out[3].unwrap() - 9.0).abs() < f64::EPSILON);
    }

    #[test]
    fn min_max() {
        let values = defined(&[5.0, 1.0, 4.0, 2.0]);
        let lo = rolling_min(&values, 2);
        let hi = rolling_max(&values, 2);
        assert_eq!(lo[1], Some(1.0));
        assert_eq!(hi[2], Some(4.0));
        assert_eq!(lo[3], Some(2.0));
    }

    #[test]
    fn sample_std_known_value() {
        // mean 5, squared deviations sum 32, / (8 - 1)
        let values = defined(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let out = rolling_std(&values, 8);
        let expected = (32.0_f64 / 7.0).sqrt();
        assert!((out[7].unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn std_of_constant_is_zero() {
        let out = rolling_std(&defined(&[3.0; 5]), 5);
        assert_eq!(out[4], Some(0.0));
    }

    #[test]
    fn zero_period_is_all_none() {
        assert!(rolling_mean(&defined(&[1.0, 2.0]), 0).iter().all(Option::is_none));
        assert!(rolling_std(&defined(&[1.0, 2.0]), 1).iter().all(Option::is_none));
    }

    #[test]
    fn period_longer_than_input() {
        let out = rolling_mean(&defined(&[1.0, 2.0]), 5);
        assert_eq!(out, vec![None, None]);
    }
}
