//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config::TraderConfig;
use crate::domain::error::TraderError;
use crate::domain::portfolio::PortfolioSnapshot;
use crate::domain::stats::TradeStatistics;

#[derive(Parser, Debug)]
#[command(name = "papertrader", about = "Simulated crypto perpetuals trader")]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Paper-trade against live market data until interrupted
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Drive the trading loop over historical CSV candles
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding one <INSTRUMENT>.csv per instrument
        #[arg(short, long)]
        data_dir: PathBuf,
        /// Override the [sqlite] path for this replay
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Summarize the persisted trade history
    Stats {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Load and validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(&cli.log_level);

    let result = match cli.command {
        Command::Run { config } => run_live(&config),
        Command::Replay {
            config,
            data_dir,
            db,
        } => run_replay(&config, &data_dir, db),
        Command::Stats { config, json } => run_stats(&config, json),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            (&e).into()
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<TraderConfig, TraderError> {
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    TraderConfig::from_port(&adapter)
}

/// Set `stop` on Ctrl-C. The signal future runs on a dedicated thread with
/// its own single-threaded runtime so the trading loop stays synchronous.
fn install_shutdown_handler(stop: Arc<AtomicBool>) -> Result<(), TraderError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("shutdown-signal".into())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("shutdown signal received");
                    stop.store(true, Ordering::SeqCst);
                }
            });
        })?;

    Ok(())
}

/// Number of loop iterations needed to step from `start` to `end` inclusive.
fn replay_cycles(start: DateTime<Utc>, end: DateTime<Utc>, step: std::time::Duration) -> u64 {
    let span = (end - start).num_seconds().max(0) as u64;
    let step = step.as_secs().max(1);
    span / step + 1
}

fn print_snapshot(snapshot: &PortfolioSnapshot) {
    println!("Capital:        {:.2}", snapshot.capital);
    println!("Available:      {:.2}", snapshot.available_capital);
    println!("Total PnL:      {:+.2}", snapshot.total_pnl);
    println!(
        "Trades:         {} ({} won, {} lost)",
        snapshot.total_trades, snapshot.winning_trades, snapshot.losing_trades
    );
    println!("Win rate:       {:.1}%", snapshot.win_rate);
    println!("Open positions: {}", snapshot.open_positions);
}

fn print_statistics(stats: &TradeStatistics) {
    println!("Closed trades:  {}", stats.total_trades);
    println!(
        "Wins / losses:  {} / {} ({:.1}%)",
        stats.wins, stats.losses, stats.win_rate
    );
    println!("Total PnL:      {:+.2}", stats.total_pnl);
    println!("Average PnL:    {:+.2}", stats.avg_pnl);
    println!("Best / worst:   {:+.2} / {:+.2}", stats.best_pnl, stats.worst_pnl);
    println!("Avg duration:   {:.1} min", stats.avg_duration_minutes);

    if !stats.by_instrument.is_empty() {
        println!();
        println!("{:<10} {:>7} {:>7} {:>12}", "Instrument", "Trades", "Win %", "PnL");
        for (instrument, b) in &stats.by_instrument {
            println!(
                "{:<10} {:>7} {:>6.1}% {:>12.2}",
                instrument,
                b.trades,
                b.win_rate(),
                b.total_pnl
            );
        }
    }

    if !stats.by_side.is_empty() {
        println!();
        for (side, b) in &stats.by_side {
            println!(
                "{:<10} {:>7} {:>6.1}% {:>12.2}",
                side,
                b.trades,
                b.win_rate(),
                b.total_pnl
            );
        }
    }
}

fn run_live(config_path: &Path) -> Result<(), TraderError> {
    let config = load_config(config_path)?;

    #[cfg(all(feature = "sqlite", feature = "hyperliquid"))]
    {
        use crate::adapters::hyperliquid_adapter::HyperliquidClient;
        use crate::adapters::sqlite_adapter::SqliteTradeSink;
        use crate::domain::clock::SystemClock;
        use crate::domain::engine::TradingEngine;
        use crate::domain::ledger::PositionLedger;

        let sink = SqliteTradeSink::from_settings(&config.sqlite)?;
        sink.initialize_schema()?;
        let data = HyperliquidClient::new(&config.hyperliquid)?;
        let clock = SystemClock;

        let stop = Arc::new(AtomicBool::new(false));
        install_shutdown_handler(Arc::clone(&stop))?;

        let ledger = PositionLedger::new(
            config.trading.initial_capital,
            config.sizing,
            config.exit,
        );
        let mut engine = TradingEngine::new(&data, &sink, &clock, config.trading, ledger);
        let snapshot = engine.run(&stop)?;
        print_snapshot(&snapshot);
        Ok(())
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config;
        Err(TraderError::FeatureDisabled { feature: "sqlite" })
    }

    #[cfg(all(feature = "sqlite", not(feature = "hyperliquid")))]
    {
        let _ = config;
        Err(TraderError::FeatureDisabled {
            feature: "hyperliquid",
        })
    }
}

fn run_replay(
    config_path: &Path,
    data_dir: &Path,
    db: Option<PathBuf>,
) -> Result<(), TraderError> {
    let mut config = load_config(config_path)?;
    if let Some(path) = db {
        config.sqlite.path = path;
    }

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::csv_adapter::CsvReplaySource;
        use crate::adapters::sqlite_adapter::SqliteTradeSink;
        use crate::domain::clock::ManualClock;
        use crate::domain::engine::TradingEngine;
        use crate::domain::ledger::PositionLedger;

        let sink = SqliteTradeSink::from_settings(&config.sqlite)?;
        sink.initialize_schema()?;

        let clock = ManualClock::new(DateTime::<Utc>::UNIX_EPOCH);
        let data = CsvReplaySource::load(data_dir, &config.trading.instruments, &clock)?;
        let (start, end) = data
            .replay_window()
            .ok_or_else(|| TraderError::Unavailable {
                instrument: config.trading.instruments.join(","),
                reason: format!("no replayable history under {}", data_dir.display()),
            })?;
        clock.set(start);

        let cycles = replay_cycles(start, end, config.trading.loop_interval);
        info!(%start, %end, cycles, "replaying history");

        let stop = Arc::new(AtomicBool::new(false));
        install_shutdown_handler(Arc::clone(&stop))?;

        let ledger = PositionLedger::new(
            config.trading.initial_capital,
            config.sizing,
            config.exit,
        );
        let mut engine = TradingEngine::new(&data, &sink, &clock, config.trading, ledger);
        let snapshot = engine.run_for(cycles, &stop)?;
        print_snapshot(&snapshot);
        Ok(())
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, data_dir);
        Err(TraderError::FeatureDisabled { feature: "sqlite" })
    }
}

fn run_stats(config_path: &Path, json: bool) -> Result<(), TraderError> {
    let config = load_config(config_path)?;

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteTradeSink;
        use crate::ports::trade_sink::TradeSink;

        let sink = SqliteTradeSink::from_settings(&config.sqlite)?;
        sink.initialize_schema()?;
        let records = sink.query_closed_trades()?;
        let stats = TradeStatistics::compute(&records);

        if json {
            let out = serde_json::to_string_pretty(&stats).map_err(std::io::Error::other)?;
            println!("{out}");
            return Ok(());
        }

        print_statistics(&stats);
        if let Some(snapshot) = sink.latest_snapshot()? {
            println!();
            println!("Latest snapshot at {}", snapshot.timestamp);
            print_snapshot(&snapshot);
        }
        Ok(())
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, json);
        Err(TraderError::FeatureDisabled { feature: "sqlite" })
    }
}

fn run_validate(config_path: &Path) -> Result<(), TraderError> {
    let config = load_config(config_path)?;
    let trading = &config.trading;

    println!("Configuration OK");
    println!("  Instruments:       {}", trading.instruments.join(", "));
    println!("  Initial capital:   {:.2}", trading.initial_capital);
    println!(
        "  Confirmations:     {} of {}",
        trading.min_confirmations,
        crate::domain::signal::CONDITION_COUNT
    );
    println!(
        "  Loop / candles:    {}s / {}",
        trading.loop_interval.as_secs(),
        trading.candle_interval
    );
    println!(
        "  Sizing:            risk {:.2}% stop {:.2}% leverage {}x",
        config.sizing.risk_per_trade * 100.0,
        config.sizing.stop_loss_pct * 100.0,
        config.sizing.leverage
    );
    println!(
        "  Hold window:       {}m to {}m",
        config.exit.min_duration.num_minutes(),
        config.exit.max_duration.num_minutes()
    );
    for tier in config.exit.tiers.tiers() {
        println!(
            "  Trailing tier:     profit >= {:.2}% trails {:.2}%",
            tier.min_profit * 100.0,
            tier.trail_pct * 100.0
        );
    }
    println!("  Trade store:       {}", config.sqlite.path.display());
    Ok(())
}
