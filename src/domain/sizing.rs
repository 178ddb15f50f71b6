//! Risk-based position sizing.
//!
//! notional = min(capital × risk / (stop_loss × leverage), capital × leverage)
//! units    = notional / price
//!
//! The first cap makes a stop-loss hit cost exactly `risk` of capital once
//! leverage is applied to PnL. The second is the buying-power ceiling.

use super::error::TraderError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingParams {
    pub risk_per_trade: f64,
    pub stop_loss_pct: f64,
    pub leverage: f64,
}

impl Default for SizingParams {
    fn default() -> Self {
        SizingParams {
            risk_per_trade: 0.01,
            stop_loss_pct: 0.01,
            leverage: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSize {
    pub notional: f64,
    pub units: f64,
}

/// Size a new position. `Ok(None)` means the result is too small to open.
pub fn size_position(
    capital: f64,
    params: &SizingParams,
    price: f64,
) -> Result<Option<PositionSize>, TraderError> {
    if !(price > 0.0 && price.is_finite()) {
        return Err(TraderError::InvalidPrice { price });
    }

    let risk_capped = capital * params.risk_per_trade / (params.stop_loss_pct * params.leverage);
    let buying_power = capital * params.leverage;
    let notional = risk_capped.min(buying_power);
    let units = notional / price;

    if units > 0.0 && units.is_finite() {
        Ok(Some(PositionSize { notional, units }))
    } else {
        Ok(None)
    }
}
