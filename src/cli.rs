//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::{CsvStore, RunSettings};
use crate::domain::backtest::{BacktestConfig, BacktestReport, Backtester};
use crate::domain::error::TradesimError;
use crate::domain::factory::strategy_from_json;
use crate::domain::metrics::BacktestMetrics;
use crate::domain::portfolio::{PortfolioState, Trade};
use crate::domain::strategy::Strategy;

#[derive(Parser, Debug)]
#[command(name = "tradesim", about = "Rule-based trading strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        /// INI run settings (dates, capital, commission, data directory)
        #[arg(short, long)]
        settings: PathBuf,
        /// JSON strategy document
        #[arg(long)]
        strategy: PathBuf,
        /// Instrument override; defaults to the strategy's first instrument
        #[arg(long)]
        instrument: Option<String>,
        /// Interval override; defaults to the strategy's first timeframe
        #[arg(long)]
        interval: Option<String>,
        /// Write a JSON report here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a strategy document without running it
    Validate {
        #[arg(long)]
        strategy: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            settings,
            strategy,
            instrument,
            interval,
            output,
        } => run_backtest(
            &settings,
            &strategy,
            instrument.as_deref(),
            interval.as_deref(),
            output.as_deref(),
        ),
        Command::Validate { strategy } => run_validate(&strategy),
    }
}

/// Serialized shape of `--output` reports.
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    strategy: &'a str,
    instrument: &'a str,
    interval: &'a str,
    metrics: &'a BacktestMetrics,
    trades: &'a [Trade],
    equity_curve: &'a [PortfolioState],
}

fn load_strategy(path: &Path) -> Result<Strategy, TradesimError> {
    let text = fs::read_to_string(path)?;
    strategy_from_json(&text)
}

fn run_backtest(
    settings_path: &Path,
    strategy_path: &Path,
    instrument_override: Option<&str>,
    interval_override: Option<&str>,
    output_path: Option<&Path>,
) -> ExitCode {
    eprintln!("Loading settings from {}", settings_path.display());
    let settings = match RunSettings::from_file(settings_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("Loading strategy from {}", strategy_path.display());
    let mut strategy = match load_strategy(strategy_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // The strategy lists what it can trade; flags narrow it to one series.
    let instrument = instrument_override
        .unwrap_or(strategy.instruments()[0].as_str())
        .to_string();
    let interval = interval_override
        .unwrap_or(strategy.timeframes()[0].as_str())
        .to_string();

    let store = CsvStore::new(settings.csv_dir.clone());
    let config = BacktestConfig {
        instrument: instrument.clone(),
        interval: interval.clone(),
        start: settings.start,
        end: settings.end,
        initial_capital: settings.initial_capital,
        commission_per_share: settings.commission_per_share,
    };

    eprintln!(
        "Running '{}' on {instrument} ({interval}) from {} to {}",
        strategy.name(),
        settings.start.date(),
        settings.end.date()
    );
    let backtester = Backtester::new(&store, config);
    let report = match backtester.run(&mut strategy) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    print_summary(&strategy, &report);

    if let Some(path) = output_path {
        let run_report = RunReport {
            strategy: strategy.name(),
            instrument: &instrument,
            interval: &interval,
            metrics: &report.metrics,
            trades: report.portfolio.trades(),
            equity_curve: report.portfolio.equity_curve(),
        };
        if let Err(e) = write_report(path, &run_report) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("Report written to {}", path.display());
    }

    ExitCode::SUCCESS
}

fn write_report(path: &Path, report: &RunReport) -> Result<(), TradesimError> {
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(file, report).map_err(|e| TradesimError::Io(e.into()))
}

fn print_summary(strategy: &Strategy, report: &BacktestReport) {
    let m = &report.metrics;
    println!("Strategy:         {}", strategy.name());
    println!("Total PnL:        {:.2}", m.total_pnl);
    println!("Total return:     {:.2}%", m.total_return_pct * 100.0);
    println!("Max drawdown:     {:.2}%", m.max_drawdown * 100.0);
    println!("Round trips:      {}", m.round_trip_trades);
    println!("Executions:       {}", m.total_executions);
    println!("Win rate:         {:.1}%", m.win_rate * 100.0);
    if m.profit_factor.is_finite() {
        println!("Profit factor:    {:.2}", m.profit_factor);
    } else {
        println!("Profit factor:    inf");
    }
    println!("Avg win PnL:      {:.2}", m.avg_win_pnl);
    println!("Avg loss PnL:     {:.2}", m.avg_loss_pnl);
    println!("Final cash:       {:.2}", report.portfolio.cash());
}

fn run_validate(strategy_path: &Path) -> ExitCode {
    let strategy = match load_strategy(strategy_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    println!("Strategy '{}' is valid", strategy.name());
    println!("  instruments: {}", strategy.instruments().join(", "));
    println!("  timeframes:  {}", strategy.timeframes().join(", "));
    if !strategy.indicator_names().is_empty() {
        println!("  indicators:  {}", strategy.indicator_names().join(", "));
    }
    println!("  entry rules:");
    for rule in strategy.entry_rules() {
        println!("    {} -> {}: {}", rule.name(), rule.action(), rule.condition().describe());
    }
    if strategy.exit_rules().is_empty() {
        println!("  exit rules:  (none)");
    } else {
        println!("  exit rules:");
        for rule in strategy.exit_rules() {
            println!("    {} -> {}: {}", rule.name(), rule.action(), rule.condition().describe());
        }
    }
    ExitCode::SUCCESS
}
