//! Event-driven backtest driver.
//!
//! Runs a strategy bar by bar over a single instrument's candle series,
//! aligning lag-bearing indicator series to it. Setup failures (no data,
//! series shorter than an indicator's lookback) abort the run; failures on
//! an individual bar degrade to "no trade on this bar" and are logged.

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use std::collections::HashMap;

use super::candle::{Candle, SignalAction};
use super::error::TradesimError;
use super::indicator::{create_indicator, Indicator};
use super::metrics::BacktestMetrics;
use super::portfolio::Portfolio;
use super::snapshot::MarketSnapshot;
use super::strategy::{Sizing, SizingMethod, Strategy};
use crate::ports::CandleStore;

/// Minimum meaningful fill price; entries at or below this are skipped.
const MIN_PRICE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub instrument: String,
    pub interval: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub initial_capital: f64,
    pub commission_per_share: f64,
}

/// Everything a run produces: the full ledger plus derived metrics.
#[derive(Debug)]
pub struct BacktestReport {
    pub portfolio: Portfolio,
    pub metrics: BacktestMetrics,
}

pub struct Backtester<'a> {
    store: &'a dyn CandleStore,
    config: BacktestConfig,
}

impl<'a> Backtester<'a> {
    pub fn new(store: &'a dyn CandleStore, config: BacktestConfig) -> Self {
        Backtester { store, config }
    }

    pub fn run(&self, strategy: &mut Strategy) -> Result<BacktestReport, TradesimError> {
        strategy.reset();

        let candles = self.store.query_candles(
            &self.config.instrument,
            &self.config.interval,
            self.config.start,
            self.config.end,
        )?;
        if candles.is_empty() {
            return Err(TradesimError::NoData {
                instrument: self.config.instrument.clone(),
                interval: self.config.interval.clone(),
            });
        }
        info!(
            "running '{}' over {} bars of {} ({})",
            strategy.name(),
            candles.len(),
            self.config.instrument,
            self.config.interval
        );

        let mut indicators: Vec<Box<dyn Indicator>> = Vec::new();
        for name in strategy.indicator_names() {
            let mut indicator = create_indicator(name)?;
            indicator.calculate(&candles)?;
            indicators.push(indicator);
        }
        let max_lookback = indicators
            .iter()
            .map(|i| i.lookback())
            .max()
            .unwrap_or(0);

        let mut portfolio = Portfolio::new(self.config.initial_capital);
        let mut previous_values: HashMap<String, f64> = HashMap::new();

        for (i, candle) in candles.iter().enumerate().skip(max_lookback) {
            let current_values = indicator_values_at(&indicators, i);
            let snapshot = MarketSnapshot::new(candle, &current_values, &previous_values);

            let action = strategy.evaluate(&snapshot);
            if action != SignalAction::None {
                self.execute_signal(&mut portfolio, action, candle, strategy.sizing());
            }

            let mut prices = HashMap::new();
            prices.insert(self.config.instrument.clone(), candle.close);
            portfolio.record_timestamp_value(candle.timestamp, &prices);

            previous_values = current_values;
        }

        let metrics = BacktestMetrics::compute(&portfolio);
        info!(
            "finished '{}': {} round trips, pnl {:.2}",
            strategy.name(),
            metrics.round_trip_trades,
            metrics.total_pnl
        );
        Ok(BacktestReport { portfolio, metrics })
    }

    /// Fills at the bar's close. A signal that cannot be sized or afforded
    /// is dropped; only this bar's trade is lost.
    fn execute_signal(
        &self,
        portfolio: &mut Portfolio,
        action: SignalAction,
        candle: &Candle,
        sizing: &Sizing,
    ) {
        let price = candle.close;
        let quantity = if action.is_entry() {
            if price <= MIN_PRICE {
                warn!(
                    "{}: skipping {action} at {}, price {price} too small",
                    self.config.instrument, candle.timestamp
                );
                return;
            }
            entry_quantity(sizing, price, self.config.initial_capital)
        } else {
            portfolio
                .position(&self.config.instrument)
                .map(|p| p.quantity.abs())
                .unwrap_or(0)
        };
        if quantity <= 0 {
            warn!(
                "{}: skipping {action} at {}, sized to zero",
                self.config.instrument, candle.timestamp
            );
            return;
        }

        let commission = self.config.commission_per_share * quantity as f64;
        if let Err(err) = portfolio.record_trade(
            &self.config.instrument,
            action,
            quantity,
            price,
            commission,
            candle.timestamp,
        ) {
            warn!(
                "{}: {action} at {} rejected: {err}",
                self.config.instrument, candle.timestamp
            );
        } else {
            debug!(
                "{}: {action} {quantity} @ {price:.4} at {}",
                self.config.instrument, candle.timestamp
            );
        }
    }
}

/// Values of every indicator at candle index `i`, keyed by canonical name.
/// Left alignment means `result()[i - lookback]` is the value for bar `i`;
/// indicators whose series does not reach `i` contribute nothing.
fn indicator_values_at(indicators: &[Box<dyn Indicator>], i: usize) -> HashMap<String, f64> {
    let mut values = HashMap::new();
    for indicator in indicators {
        let lookback = indicator.lookback();
        if i >= lookback {
            if let Some(&value) = indicator.result().get(i - lookback) {
                values.insert(indicator.name().to_string(), value);
            }
        }
    }
    values
}

/// Entry sizing. Fixed quantities floor to whole units with a minimum of
/// one; capital-based sizing floors capital / price and may come out zero.
/// Percentages are always of initial capital, not current equity.
fn entry_quantity(sizing: &Sizing, price: f64, initial_capital: f64) -> i64 {
    match sizing.method {
        SizingMethod::Quantity => (sizing.value.floor() as i64).max(1),
        SizingMethod::CapitalBased => {
            let capital = if sizing.is_percentage {
                sizing.value / 100.0 * initial_capital
            } else {
                sizing.value
            };
            (capital / price).floor() as i64
        }
    }
}
