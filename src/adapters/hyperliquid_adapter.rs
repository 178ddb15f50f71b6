//! Hyperliquid public info API.
//!
//! Candles come from `candleSnapshot`, the tradable universe from `meta`.
//! Both are POSTs to a single info endpoint. Any transport, HTTP or shape
//! failure surfaces as [`TraderError::Unavailable`] so the engine skips the
//! instrument for the cycle.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::collections::HashSet;
use tracing::debug;

use crate::domain::config::HyperliquidSettings;
use crate::domain::error::TraderError;
use crate::domain::ohlcv::{OhlcvBar, PriceSeries, history_span};
use crate::ports::data_port::MarketDataPort;

const UNIVERSE: &str = "universe";

pub struct HyperliquidClient {
    client: reqwest::blocking::Client,
    url: String,
    min_leverage: f64,
}

fn unavailable(instrument: &str, reason: impl Into<String>) -> TraderError {
    TraderError::Unavailable {
        instrument: instrument.to_string(),
        reason: reason.into(),
    }
}

impl HyperliquidClient {
    pub fn new(settings: &HyperliquidSettings) -> Result<Self, TraderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| unavailable(UNIVERSE, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: settings.url.clone(),
            min_leverage: settings.min_leverage,
        })
    }

    fn post(&self, instrument: &str, body: &Value) -> Result<Value, TraderError> {
        let resp = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .map_err(|e| unavailable(instrument, format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(unavailable(instrument, format!("HTTP {status}")));
        }

        resp.json()
            .map_err(|e| unavailable(instrument, format!("invalid JSON response: {e}")))
    }
}

/// Start of the request window: enough history for a full series, or the
/// epoch when the interval label is not recognised.
fn window_start(interval: &str, now: DateTime<Utc>) -> i64 {
    history_span(interval)
        .and_then(|span| now.checked_sub_signed(span))
        .map_or(0, |start| start.timestamp_millis())
}

/// A JSON number or a numeric string.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn field<'v>(row: &'v Value, short: &str, long: &str) -> Option<&'v Value> {
    row.get(short).or_else(|| row.get(long))
}

fn parse_bar(instrument: &str, idx: usize, row: &Value) -> Result<OhlcvBar, TraderError> {
    let get = |short: &str, long: &str| -> Result<f64, TraderError> {
        field(row, short, long).and_then(number).ok_or_else(|| {
            unavailable(instrument, format!("candle {idx}: missing or bad '{long}'"))
        })
    };

    let millis = get("t", "timestamp")?;
    let timestamp = DateTime::from_timestamp_millis(millis as i64).ok_or_else(|| {
        unavailable(instrument, format!("candle {idx}: bad timestamp {millis}"))
    })?;

    Ok(OhlcvBar {
        timestamp,
        open: get("o", "open")?,
        high: get("h", "high")?,
        low: get("l", "low")?,
        close: get("c", "close")?,
        volume: get("v", "volume")?,
    })
}

/// Extract candles from a `candleSnapshot` response. The payload is either a
/// bare array or an object wrapping one under a well-known key.
fn parse_candles(instrument: &str, response: &Value) -> Result<Vec<OhlcvBar>, TraderError> {
    let rows = match response {
        Value::Array(rows) => rows,
        Value::Object(map) => ["data", "candles", "candle", "snapshot", "result"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .ok_or_else(|| unavailable(instrument, "no candle array in response"))?,
        _ => return Err(unavailable(instrument, "unexpected candle payload")),
    };

    let mut bars = rows
        .iter()
        .enumerate()
        .map(|(idx, row)| parse_bar(instrument, idx, row))
        .collect::<Result<Vec<_>, _>>()?;
    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

/// Names in a `meta` response whose maximum leverage is at least
/// `min_leverage`.
fn parse_universe(response: &Value, min_leverage: f64) -> Result<HashSet<String>, TraderError> {
    let entries = response
        .get(UNIVERSE)
        .and_then(Value::as_array)
        .ok_or_else(|| unavailable(UNIVERSE, "meta response has no universe"))?;

    Ok(entries
        .iter()
        .filter(|e| e.get("maxLeverage").and_then(number).unwrap_or(0.0) >= min_leverage)
        .filter_map(|e| e.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

impl MarketDataPort for HyperliquidClient {
    fn fetch_candles(&self, instrument: &str, interval: &str) -> Result<PriceSeries, TraderError> {
        let body = json!({
            "type": "candleSnapshot",
            "req": {
                "coin": instrument,
                "interval": interval,
                "startTime": window_start(interval, Utc::now()),
            }
        });
        let response = self.post(instrument, &body)?;
        let bars = parse_candles(instrument, &response)?;
        debug!(instrument = %instrument, bars = bars.len(), "fetched candles");
        PriceSeries::new(instrument, bars)
    }

    fn list_tradable_instruments(&self) -> Result<HashSet<String>, TraderError> {
        let response = self.post(UNIVERSE, &json!({ "type": "meta" }))?;
        parse_universe(&response, self.min_leverage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::MAX_BARS;
    use chrono::TimeZone;

    #[test]
    fn candles_from_bare_array_with_string_numbers() {
        let response = json!([
            {"t": 1_700_000_300_000_i64, "o": "101", "h": "103", "l": "100", "c": "102", "v": "7.5"},
            {"t": 1_700_000_000_000_i64, "o": 100.0, "h": 102.0, "l": 99.0, "c": 101.0, "v": 5}
        ]);
        let bars = parse_candles("BTC", &response).unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
        assert!((bars[0].close - 101.0).abs() < f64::EPSILON);
        assert!((bars[1].volume - 7.5).abs() < f64::EPSILON);
    }

    #[test]
    fn candles_under_data_key_with_long_names() {
        let response = json!({"data": [
            {"timestamp": 1_700_000_000_000_i64, "open": 1, "high": 2, "low": 0.5, "close": 1.5, "volume": 3}
        ]});
        let bars = parse_candles("ETH", &response).unwrap();
        assert_eq!(bars.len(), 1);
        assert!((bars[0].low - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_candle_is_unavailable() {
        let response = json!([{"t": 1_700_000_000_000_i64, "o": "x", "h": 1, "l": 1, "c": 1, "v": 1}]);
        let err = parse_candles("SOL", &response).unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("open"));

        assert!(parse_candles("SOL", &json!({"status": "ok"})).is_err());
        assert!(parse_candles("SOL", &json!("nope")).is_err());
    }

    #[test]
    fn universe_filters_by_leverage() {
        let response = json!({"universe": [
            {"name": "BTC", "maxLeverage": 50},
            {"name": "ETH", "maxLeverage": 2},
            {"name": "PEPE", "maxLeverage": 1},
            {"name": "XYZ"}
        ]});
        let names = parse_universe(&response, 2.0).unwrap();
        assert_eq!(names.len(), 2);
        assert!(names.contains("BTC"));
        assert!(names.contains("ETH"));
        assert!(parse_universe(&json!({}), 2.0).is_err());
    }

    #[test]
    fn window_covers_max_bars() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let start = window_start("5m", now);
        let expected = now - chrono::Duration::minutes(5 * MAX_BARS as i64);
        assert_eq!(start, expected.timestamp_millis());
        assert_eq!(window_start("weird", now), 0);
        assert_eq!(window_start("999999999999999999m", now), 0);
    }
}
