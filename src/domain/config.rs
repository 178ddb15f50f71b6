//! Startup configuration.
//!
//! Reads every recognised key through [`ConfigPort`], applies defaults and
//! validates. Any violation is fatal and reported as
//! [`TraderError::ConfigInvalid`] naming the offending section and key.

use chrono::Duration;
use std::path::PathBuf;

use crate::domain::error::TraderError;
use crate::domain::exit_policy::{ExitPolicy, TrailingTable};
use crate::domain::ohlcv::history_span;
use crate::domain::signal::{CONDITION_COUNT, DEFAULT_MIN_CONFIRMATIONS};
use crate::domain::sizing::SizingParams;
use crate::domain::universe::parse_instruments;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_INSTRUMENTS: &str = "BTC,ETH,SOL,ARB,MATIC";
pub const DEFAULT_TRAILING_TIERS: &str = "0.0:0.015, 0.015:0.012, 0.03:0.010, 0.05:0.008";
pub const DEFAULT_HYPERLIQUID_URL: &str = "https://api.hyperliquid.xyz/info";

/// Settings for the polling loop itself.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingSettings {
    pub instruments: Vec<String>,
    pub initial_capital: f64,
    pub min_confirmations: u8,
    pub loop_interval: std::time::Duration,
    pub candle_interval: String,
    /// Persist a portfolio snapshot every this many cycles.
    pub snapshot_every: u64,
    pub close_on_shutdown: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqliteSettings {
    pub path: PathBuf,
    pub pool_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HyperliquidSettings {
    pub url: String,
    pub timeout: std::time::Duration,
    pub min_leverage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraderConfig {
    pub trading: TradingSettings,
    pub sizing: SizingParams,
    pub exit: ExitPolicy,
    pub sqlite: SqliteSettings,
    pub hyperliquid: HyperliquidSettings,
}

impl TraderConfig {
    pub fn from_port(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let trading = trading_settings(config)?;
        let sizing = sizing_params(config)?;
        let exit = exit_policy(config, sizing.stop_loss_pct)?;
        Ok(TraderConfig {
            trading,
            sizing,
            exit,
            sqlite: sqlite_settings(config)?,
            hyperliquid: hyperliquid_settings(config)?,
        })
    }
}

fn double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TraderError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            TraderError::invalid_config(section, key, format!("'{raw}' is not a number"))
        })
}

fn int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, TraderError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(default);
    };
    raw.trim().parse::<i64>().map_err(|_| {
        TraderError::invalid_config(section, key, format!("'{raw}' is not an integer"))
    })
}

fn positive(section: &str, key: &str, value: f64) -> Result<f64, TraderError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(TraderError::invalid_config(section, key, format!("{key} must be positive")))
    }
}

fn positive_int(section: &str, key: &str, value: i64) -> Result<u64, TraderError> {
    u64::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| TraderError::invalid_config(section, key, format!("{key} must be positive")))
}

fn trading_settings(config: &dyn ConfigPort) -> Result<TradingSettings, TraderError> {
    let raw_instruments = config
        .get_string("trading", "instruments")
        .unwrap_or_else(|| DEFAULT_INSTRUMENTS.to_string());
    let instruments = parse_instruments(&raw_instruments)
        .map_err(|e| TraderError::invalid_config("trading", "instruments", e.to_string()))?;

    let initial_capital = positive(
        "trading",
        "initial_capital",
        double(config, "trading", "initial_capital", 1000.0)?,
    )?;

    let min_confirmations = int(
        config,
        "trading",
        "min_confirmations",
        i64::from(DEFAULT_MIN_CONFIRMATIONS),
    )?;
    let min_confirmations = u8::try_from(min_confirmations)
        .ok()
        .filter(|v| (1..=CONDITION_COUNT).contains(v))
        .ok_or_else(|| {
            TraderError::invalid_config(
                "trading",
                "min_confirmations",
                format!("must be between 1 and {CONDITION_COUNT}"),
            )
        })?;

    let loop_secs = positive_int(
        "trading",
        "loop_interval_secs",
        int(config, "trading", "loop_interval_secs", 60)?,
    )?;
    let snapshot_every = positive_int(
        "trading",
        "snapshot_every",
        int(config, "trading", "snapshot_every", 10)?,
    )?;

    let candle_interval = config
        .get_string("trading", "candle_interval")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "5m".to_string());
    if history_span(&candle_interval).is_none() {
        return Err(TraderError::invalid_config(
            "trading",
            "candle_interval",
            format!("'{candle_interval}' is not a supported interval such as 1m, 4h, 1d or 1w"),
        ));
    }

    Ok(TradingSettings {
        instruments,
        initial_capital,
        min_confirmations,
        loop_interval: std::time::Duration::from_secs(loop_secs),
        candle_interval,
        snapshot_every,
        close_on_shutdown: config.get_bool("trading", "close_on_shutdown", false),
    })
}

fn sizing_params(config: &dyn ConfigPort) -> Result<SizingParams, TraderError> {
    let leverage = positive("trading", "leverage", double(config, "trading", "leverage", 2.0)?)?;

    let risk_per_trade = double(config, "trading", "risk_per_trade", 0.01)?;
    if !(risk_per_trade > 0.0 && risk_per_trade <= 1.0) {
        return Err(TraderError::invalid_config(
            "trading",
            "risk_per_trade",
            "risk_per_trade must be in (0, 1]",
        ));
    }

    let stop_loss_pct = double(config, "risk", "stop_loss_pct", 0.01)?;
    if !(stop_loss_pct > 0.0 && stop_loss_pct < 1.0) {
        return Err(TraderError::invalid_config(
            "risk",
            "stop_loss_pct",
            "stop_loss_pct must be in (0, 1)",
        ));
    }

    Ok(SizingParams {
        risk_per_trade,
        stop_loss_pct,
        leverage,
    })
}

/// Whole minutes as a chrono duration, rejecting values it cannot hold.
fn minutes(key: &str, value: i64) -> Result<Duration, TraderError> {
    Duration::try_minutes(value)
        .ok_or_else(|| TraderError::invalid_config("risk", key, format!("{key} is too large")))
}

fn exit_policy(config: &dyn ConfigPort, stop_loss_pct: f64) -> Result<ExitPolicy, TraderError> {
    let min_mins = int(config, "risk", "min_trade_duration_mins", 5)?;
    if min_mins < 0 {
        return Err(TraderError::invalid_config(
            "risk",
            "min_trade_duration_mins",
            "min_trade_duration_mins must be non-negative",
        ));
    }
    let max_mins = int(config, "risk", "max_trade_duration_mins", 120)?;
    if max_mins <= 0 {
        return Err(TraderError::invalid_config(
            "risk",
            "max_trade_duration_mins",
            "max_trade_duration_mins must be positive",
        ));
    }
    let min_duration = minutes("min_trade_duration_mins", min_mins)?;
    let max_duration = minutes("max_trade_duration_mins", max_mins)?;
    if min_duration > max_duration {
        return Err(TraderError::invalid_config(
            "risk",
            "min_trade_duration_mins",
            "min_trade_duration_mins must not exceed max_trade_duration_mins",
        ));
    }

    let raw_tiers = config
        .get_string("risk", "trailing_tiers")
        .unwrap_or_else(|| DEFAULT_TRAILING_TIERS.to_string());
    let tiers = TrailingTable::try_from(raw_tiers.as_str())?;

    Ok(ExitPolicy {
        stop_loss_pct,
        min_duration,
        max_duration,
        tiers,
    })
}

fn sqlite_settings(config: &dyn ConfigPort) -> Result<SqliteSettings, TraderError> {
    let path = config
        .get_string("sqlite", "path")
        .unwrap_or_else(|| "trading_simulation.db".to_string());
    let pool_size = positive_int("sqlite", "pool_size", int(config, "sqlite", "pool_size", 4)?)?;
    let pool_size = u32::try_from(pool_size)
        .map_err(|_| TraderError::invalid_config("sqlite", "pool_size", "pool_size is too large"))?;
    Ok(SqliteSettings {
        path: PathBuf::from(path),
        pool_size,
    })
}

fn hyperliquid_settings(config: &dyn ConfigPort) -> Result<HyperliquidSettings, TraderError> {
    let url = config
        .get_string("hyperliquid", "url")
        .unwrap_or_else(|| DEFAULT_HYPERLIQUID_URL.to_string());
    let timeout_secs = positive_int(
        "hyperliquid",
        "timeout_secs",
        int(config, "hyperliquid", "timeout_secs", 10)?,
    )?;
    let min_leverage = double(config, "hyperliquid", "min_leverage", 2.0)?;
    if min_leverage < 0.0 {
        return Err(TraderError::invalid_config(
            "hyperliquid",
            "min_leverage",
            "min_leverage must be non-negative",
        ));
    }
    Ok(HyperliquidSettings {
        url,
        timeout: std::time::Duration::from_secs(timeout_secs),
        min_leverage,
    })
}
