//! SQLite trade history.
//!
//! Two tables: `trades` holds one row per position, inserted as `OPEN` with
//! the full entry indicator vector and finalized in place on close;
//! `portfolio` holds periodic snapshots.

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params, params_from_iter};
use tracing::{debug, warn};

use crate::domain::config::SqliteSettings;
use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorVector;
use crate::domain::portfolio::PortfolioSnapshot;
use crate::domain::position::{ClosedTrade, Position, Side};
use crate::domain::signal::SignalScore;
use crate::ports::trade_sink::{TradeRecord, TradeSink};

const STATUS_OPEN: &str = "OPEN";
const STATUS_CLOSED: &str = "CLOSED";

pub struct SqliteTradeSink {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> TraderError {
    TraderError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> TraderError {
    TraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, TraderError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e: chrono::ParseError| TraderError::Database {
            reason: format!("bad timestamp '{raw}': {e}"),
        })
}

impl SqliteTradeSink {
    pub fn from_settings(settings: &SqliteSettings) -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::file(&settings.path);
        let pool = Pool::builder()
            .max_size(settings.pool_size)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), TraderError> {
        let conn = self.pool.get().map_err(pool_error)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                instrument TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                side TEXT NOT NULL,
                entry_price REAL NOT NULL,
                exit_price REAL,
                units REAL NOT NULL,
                notional REAL NOT NULL,
                leverage REAL NOT NULL,
                pnl REAL,
                pnl_pct REAL,
                duration_minutes REAL,
                exit_reason TEXT,
                exit_time TEXT,
                status TEXT NOT NULL DEFAULT 'OPEN',
                price REAL, rsi REAL,
                ema8 REAL, ema21 REAL, ema50 REAL, ema200 REAL,
                price_vs_ema8 REAL, price_vs_ema21 REAL,
                price_vs_ema50 REAL, price_vs_ema200 REAL,
                macd REAL, macd_signal REAL, macd_histogram REAL,
                stoch_k REAL, stoch_d REAL,
                bb_upper REAL, bb_middle REAL, bb_lower REAL, bb_width REAL,
                atr REAL, adx REAL, cci REAL, roc REAL, williams_r REAL,
                obv REAL, vwap REAL, price_vs_vwap REAL,
                volume_ratio REAL, volatility REAL, momentum REAL,
                supertrend REAL,
                supertrend_dir INTEGER,
                trend_short TEXT, trend_medium TEXT, trend_long TEXT,
                bull_score INTEGER NOT NULL,
                bear_score INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_instrument_status
                ON trades(instrument, status);
            CREATE TABLE IF NOT EXISTS portfolio (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                total_capital REAL NOT NULL,
                available_capital REAL NOT NULL,
                total_pnl REAL NOT NULL,
                total_trades INTEGER NOT NULL,
                winning_trades INTEGER NOT NULL,
                losing_trades INTEGER NOT NULL,
                win_rate REAL NOT NULL,
                open_positions INTEGER NOT NULL
            );",
        )
        .map_err(query_error)?;

        Ok(())
    }

    /// The most recently persisted portfolio snapshot, if any.
    pub fn latest_snapshot(&self) -> Result<Option<PortfolioSnapshot>, TraderError> {
        let conn = self.pool.get().map_err(pool_error)?;

        let row = conn
            .query_row(
                "SELECT timestamp, total_capital, available_capital, total_pnl,
                        total_trades, winning_trades, losing_trades, win_rate,
                        open_positions
                 FROM portfolio ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, u32>(5)?,
                        row.get::<_, u32>(6)?,
                        row.get::<_, f64>(7)?,
                        row.get::<_, i64>(8)?,
                    ))
                },
            )
            .optional()
            .map_err(query_error)?;

        let Some((ts, capital, available, pnl, trades, wins, losses, win_rate, open)) = row else {
            return Ok(None);
        };

        Ok(Some(PortfolioSnapshot {
            timestamp: parse_time(&ts)?,
            capital,
            available_capital: available,
            total_pnl: pnl,
            total_trades: trades,
            winning_trades: wins,
            losing_trades: losses,
            win_rate,
            open_positions: open.max(0) as usize,
        }))
    }
}

impl TradeSink for SqliteTradeSink {
    fn append_trade_open(
        &self,
        position: &Position,
        indicators: &IndicatorVector,
        score: &SignalScore,
    ) -> Result<(), TraderError> {
        let conn = self.pool.get().map_err(pool_error)?;

        let numeric = indicators.numeric_fields();
        let mut columns: Vec<&str> = vec![
            "instrument",
            "timestamp",
            "side",
            "entry_price",
            "units",
            "notional",
            "leverage",
            "status",
        ];
        let mut values: Vec<Value> = vec![
            Value::Text(position.instrument.clone()),
            Value::Text(position.entry_time.to_rfc3339()),
            Value::Text(position.side.as_str().to_string()),
            Value::Real(position.entry_price),
            Value::Real(position.units),
            Value::Real(position.notional),
            Value::Real(position.leverage),
            Value::Text(STATUS_OPEN.to_string()),
        ];

        for (name, value) in numeric {
            columns.push(name);
            values.push(Value::Real(value));
        }

        columns.extend([
            "supertrend",
            "supertrend_dir",
            "trend_short",
            "trend_medium",
            "trend_long",
            "bull_score",
            "bear_score",
        ]);
        values.extend([
            indicators.supertrend.map_or(Value::Null, Value::Real),
            Value::Integer(i64::from(indicators.supertrend_dir)),
            Value::Text(indicators.trend_short.as_str().to_string()),
            Value::Text(indicators.trend_medium.as_str().to_string()),
            Value::Text(indicators.trend_long.as_str().to_string()),
            Value::Integer(i64::from(score.bull_score)),
            Value::Integer(i64::from(score.bear_score)),
        ]);

        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO trades ({}) VALUES ({placeholders})",
            columns.join(", ")
        );

        conn.execute(&sql, params_from_iter(values))
            .map_err(query_error)?;

        debug!(instrument = %position.instrument, side = %position.side, "trade open persisted");
        Ok(())
    }

    fn finalize_trade_close(&self, trade: &ClosedTrade) -> Result<(), TraderError> {
        let conn = self.pool.get().map_err(pool_error)?;

        let updated = conn
            .execute(
                "UPDATE trades
                 SET exit_price = ?1, pnl = ?2, pnl_pct = ?3, duration_minutes = ?4,
                     exit_reason = ?5, exit_time = ?6, status = ?7
                 WHERE id = (
                     SELECT id FROM trades
                     WHERE instrument = ?8 AND status = ?9
                     ORDER BY id DESC LIMIT 1
                 )",
                params![
                    trade.exit_price,
                    trade.pnl,
                    trade.pnl_fraction * 100.0,
                    trade.duration_minutes(),
                    trade.reason.as_str(),
                    trade.exit_time.to_rfc3339(),
                    STATUS_CLOSED,
                    trade.instrument,
                    STATUS_OPEN,
                ],
            )
            .map_err(query_error)?;

        if updated == 0 {
            warn!(instrument = %trade.instrument, "no open trade record to finalize");
        }
        Ok(())
    }

    fn append_portfolio_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<(), TraderError> {
        let conn = self.pool.get().map_err(pool_error)?;

        conn.execute(
            "INSERT INTO portfolio (timestamp, total_capital, available_capital, total_pnl,
                                    total_trades, winning_trades, losing_trades, win_rate,
                                    open_positions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                snapshot.timestamp.to_rfc3339(),
                snapshot.capital,
                snapshot.available_capital,
                snapshot.total_pnl,
                snapshot.total_trades,
                snapshot.winning_trades,
                snapshot.losing_trades,
                snapshot.win_rate,
                snapshot.open_positions as i64,
            ],
        )
        .map_err(query_error)?;

        Ok(())
    }

    fn query_closed_trades(&self) -> Result<Vec<TradeRecord>, TraderError> {
        let conn = self.pool.get().map_err(pool_error)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, instrument, timestamp, side, entry_price, exit_price, units,
                        notional, leverage, pnl, pnl_pct, duration_minutes, exit_reason,
                        bull_score, bear_score
                 FROM trades WHERE status = ?1 ORDER BY id",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(params![STATUS_CLOSED], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, f64>(7)?,
                    row.get::<_, f64>(8)?,
                    row.get::<_, Option<f64>>(9)?,
                    row.get::<_, Option<f64>>(10)?,
                    row.get::<_, Option<f64>>(11)?,
                    row.get::<_, Option<String>>(12)?,
                    row.get::<_, u8>(13)?,
                    row.get::<_, u8>(14)?,
                ))
            })
            .map_err(query_error)?;

        let mut records = Vec::new();
        for row in rows {
            let (
                id,
                instrument,
                ts,
                side,
                entry_price,
                exit_price,
                units,
                notional,
                leverage,
                pnl,
                pnl_pct,
                duration_minutes,
                exit_reason,
                bull_score,
                bear_score,
            ) = row.map_err(query_error)?;

            let side = Side::parse(&side).ok_or_else(|| TraderError::Database {
                reason: format!("trade {id}: unknown side '{side}'"),
            })?;

            records.push(TradeRecord {
                id,
                instrument,
                opened_at: parse_time(&ts)?,
                side,
                entry_price,
                exit_price,
                units,
                notional,
                leverage,
                pnl,
                pnl_pct,
                duration_minutes,
                exit_reason,
                bull_score,
                bear_score,
            });
        }

        Ok(records)
    }
}
