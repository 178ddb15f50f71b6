//! Directional signal classification from an indicator vector.
//!
//! Seven bull and seven bear conditions are evaluated independently and
//! counted. A side fires when its count reaches the confirmation threshold.
//! When both sides reach it on the same vector, LONG wins: the bull count is
//! checked first and this priority is part of the contract.

use std::fmt;

use super::indicator::IndicatorVector;
use super::indicator::supertrend::{DIRECTION_DOWN, DIRECTION_UP};

pub const CONDITION_COUNT: u8 = 7;
pub const DEFAULT_MIN_CONFIRMATIONS: u8 = 5;

pub const RSI_OVERSOLD: f64 = 36.0;
pub const RSI_OVERBOUGHT: f64 = 64.0;
pub const STOCH_LOW: f64 = 25.0;
pub const STOCH_HIGH: f64 = 75.0;
pub const VOLUME_SPIKE: f64 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Long,
    Short,
    Neutral,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::Long => "LONG",
            Signal::Short => "SHORT",
            Signal::Neutral => "NONE",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalScore {
    pub bull_score: u8,
    pub bear_score: u8,
    pub signal: Signal,
}

pub fn bull_conditions(ind: &IndicatorVector) -> [bool; 7] {
    [
        ind.rsi < RSI_OVERSOLD,
        ind.ema8 > ind.ema21,
        ind.macd > ind.macd_signal && ind.macd_histogram > 0.0,
        ind.stoch_k < STOCH_LOW && ind.stoch_k > ind.stoch_d,
        ind.price < ind.bb_lower,
        ind.volume_ratio > VOLUME_SPIKE,
        ind.supertrend_dir == DIRECTION_UP,
    ]
}

/// Mirror of [`bull_conditions`]. The volume condition is shared.
pub fn bear_conditions(ind: &IndicatorVector) -> [bool; 7] {
    [
        ind.rsi > RSI_OVERBOUGHT,
        ind.ema8 < ind.ema21,
        ind.macd < ind.macd_signal && ind.macd_histogram < 0.0,
        ind.stoch_k > STOCH_HIGH && ind.stoch_k < ind.stoch_d,
        ind.price > ind.bb_upper,
        ind.volume_ratio > VOLUME_SPIKE,
        ind.supertrend_dir == DIRECTION_DOWN,
    ]
}

fn count(conditions: [bool; 7]) -> u8 {
    conditions.iter().filter(|c| **c).count() as u8
}

pub fn classify(ind: &IndicatorVector, min_confirmations: u8) -> SignalScore {
    let bull_score = count(bull_conditions(ind));
    let bear_score = count(bear_conditions(ind));

    let signal = if bull_score >= min_confirmations {
        Signal::Long
    } else if bear_score >= min_confirmations {
        Signal::Short
    } else {
        Signal::Neutral
    };

    SignalScore {
        bull_score,
        bear_score,
        signal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn neutral_vector() -> IndicatorVector {
        IndicatorVector::neutral(Utc.timestamp_opt(1_700_000_000, 0).unwrap(), 100.0)
    }

    fn all_bull() -> IndicatorVector {
        IndicatorVector {
            rsi: 30.0,
            ema8: 101.0,
            ema21: 100.0,
            macd: 1.0,
            macd_signal: 0.5,
            macd_histogram: 0.5,
            stoch_k: 20.0,
            stoch_d: 15.0,
            price: 94.0,
            volume_ratio: 1.5,
            supertrend_dir: 1,
            ..neutral_vector()
        }
    }

    fn all_bear() -> IndicatorVector {
        IndicatorVector {
            rsi: 70.0,
            ema8: 99.0,
            ema21: 100.0,
            macd: -1.0,
            macd_signal: -0.5,
            macd_histogram: -0.5,
            stoch_k: 80.0,
            stoch_d: 85.0,
            price: 106.0,
            volume_ratio: 1.5,
            supertrend_dir: -1,
            ..neutral_vector()
        }
    }

    #[test]
    fn neutral_scores_zero() {
        let score = classify(&neutral_vector(), DEFAULT_MIN_CONFIRMATIONS);
        assert_eq!(score.bull_score, 0);
        assert_eq!(score.bear_score, 0);
        assert_eq!(score.signal, Signal::Neutral);
    }

    #[test]
    fn all_bull_conditions_go_long() {
        let score = classify(&all_bull(), DEFAULT_MIN_CONFIRMATIONS);
        assert_eq!(score.bull_score, 7);
        // only the shared volume condition counts for bears
        assert_eq!(score.bear_score, 1);
        assert_eq!(score.signal, Signal::Long);
    }

    #[test]
    fn all_bear_conditions_go_short() {
        let score = classify(&all_bear(), DEFAULT_MIN_CONFIRMATIONS);
        assert_eq!(score.bear_score, 7);
        assert_eq!(score.bull_score, 1);
        assert_eq!(score.signal, Signal::Short);
    }

    #[test]
    fn long_takes_priority_when_both_reach_threshold() {
        // bull: ema, macd, volume, supertrend; bear: rsi, stoch, price, volume
        let ind = IndicatorVector {
            rsi: 70.0,
            ema8: 101.0,
            ema21: 100.0,
            macd: 1.0,
            macd_signal: 0.5,
            macd_histogram: 0.5,
            stoch_k: 80.0,
            stoch_d: 85.0,
            price: 106.0,
            volume_ratio: 1.5,
            supertrend_dir: 1,
            ..neutral_vector()
        };
        let score = classify(&ind, 4);
        assert_eq!(score.bull_score, 4);
        assert_eq!(score.bear_score, 4);
        assert_eq!(score.signal, Signal::Long);
    }

    #[test]
    fn threshold_is_inclusive() {
        let ind = IndicatorVector {
            rsi: 30.0,
            ema8: 101.0,
            ema21: 100.0,
            macd: 1.0,
            macd_signal: 0.5,
            macd_histogram: 0.5,
            volume_ratio: 1.5,
            supertrend_dir: 1,
            ..neutral_vector()
        };
        assert_eq!(classify(&ind, 5).signal, Signal::Long);
        assert_eq!(classify(&ind, 6).signal, Signal::Neutral);
    }

    #[test]
    fn macd_requires_positive_histogram() {
        let ind = IndicatorVector {
            macd: 1.0,
            macd_signal: 0.5,
            macd_histogram: 0.0,
            ..neutral_vector()
        };
        assert!(!bull_conditions(&ind)[2]);
    }

    #[test]
    fn stochastic_requires_cross() {
        let ind = IndicatorVector {
            stoch_k: 20.0,
            stoch_d: 22.0,
            ..neutral_vector()
        };
        assert!(!bull_conditions(&ind)[3]);
    }

    fn arb_vector() -> impl Strategy<Value = IndicatorVector> {
        let momentum = (
            0.0f64..100.0,
            50.0f64..150.0,
            50.0f64..150.0,
            -2.0f64..2.0,
            -2.0f64..2.0,
            -2.0f64..2.0,
        );
        let range = (
            0.0f64..100.0,
            0.0f64..100.0,
            50.0f64..150.0,
            80.0f64..120.0,
            0.0f64..20.0,
            0.0f64..3.0,
            -1i8..=1,
        );
        (momentum, range).prop_map(
            |(
                (rsi, ema8, ema21, macd, macd_signal, macd_histogram),
                (stoch_k, stoch_d, price, bb_middle, half_width, volume_ratio, supertrend_dir),
            )| IndicatorVector {
                rsi,
                ema8,
                ema21,
                macd,
                macd_signal,
                macd_histogram,
                stoch_k,
                stoch_d,
                price,
                bb_upper: bb_middle + half_width,
                bb_middle,
                bb_lower: bb_middle - half_width,
                volume_ratio,
                supertrend_dir,
                ..neutral_vector()
            },
        )
    }

    proptest! {
        #[test]
        fn bull_plus_contradictions_bounded(ind in arb_vector()) {
            let bull = bull_conditions(&ind);
            let bear = bear_conditions(&ind);
            // volume (index 5) is shared and never contradicts
            let contradicting = (0..7).filter(|&i| i != 5 && bear[i]).count() as u8;
            prop_assert!(count(bull) + contradicting <= CONDITION_COUNT);

            let score = classify(&ind, DEFAULT_MIN_CONFIRMATIONS);
            prop_assert!(score.bull_score <= CONDITION_COUNT);
            prop_assert!(score.bear_score <= CONDITION_COUNT);
        }
    }

    #[test]
    fn signal_display() {
        assert_eq!(Signal::Long.to_string(), "LONG");
        assert_eq!(Signal::Short.to_string(), "SHORT");
        assert_eq!(Signal::Neutral.to_string(), "NONE");
    }
}
