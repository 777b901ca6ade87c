//! Portfolio ledger: cash, open positions, completed trades, equity curve.
//!
//! The ledger is the single source of truth for money. It re-validates every
//! fill it is asked to record, even though the strategy state machine and the
//! driver have already screened the action; an inconsistent fill is rejected
//! with an execution error and leaves the ledger untouched.

use chrono::NaiveDateTime;
use log::{debug, warn};
use std::collections::HashMap;

use super::candle::SignalAction;
use super::error::TradesimError;

/// Minimum meaningful price; fills at or below this are rejected.
const MIN_PRICE: f64 = 1e-9;

/// A held position. Quantity is signed: positive long, negative short.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub quantity: i64,
    pub entry_commission: f64,
}

/// A completed round trip, recorded when an exit flattens a position.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Trade {
    pub instrument: String,
    pub entry_action: SignalAction,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub commission: f64,
    pub pnl: f64,
    pub return_pct: f64,
}

/// One point on the equity curve.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PortfolioState {
    pub timestamp: NaiveDateTime,
    pub cash: f64,
    pub positions_value: f64,
    pub total_equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    cash: f64,
    initial_capital: f64,
    positions: HashMap<String, OpenPosition>,
    trades: Vec<Trade>,
    equity_curve: Vec<PortfolioState>,
    total_executions: u64,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            positions: HashMap::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            total_executions: 0,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn position(&self, instrument: &str) -> Option<&OpenPosition> {
        self.positions.get(instrument)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[PortfolioState] {
        &self.equity_curve
    }

    /// Per-leg fill count: entries and exits both count.
    pub fn total_executions(&self) -> u64 {
        self.total_executions
    }

    /// Records one fill. Entries open a position; exits close the whole
    /// position and append a `Trade`. Returns an execution error (and changes
    /// nothing) when the fill is inconsistent with the ledger or would drive
    /// cash negative.
    pub fn record_trade(
        &mut self,
        instrument: &str,
        action: SignalAction,
        quantity: i64,
        price: f64,
        commission: f64,
        timestamp: NaiveDateTime,
    ) -> Result<(), TradesimError> {
        if quantity <= 0 {
            return Err(TradesimError::InvalidTrade {
                reason: format!("quantity {quantity} must be positive"),
            });
        }
        if price <= MIN_PRICE {
            return Err(TradesimError::InvalidTrade {
                reason: format!("price {price} must be positive"),
            });
        }

        match action {
            SignalAction::EnterLong | SignalAction::EnterShort => {
                self.open_position(instrument, action, quantity, price, commission, timestamp)
            }
            SignalAction::ExitLong | SignalAction::ExitShort => {
                self.close_position(instrument, action, quantity, price, commission, timestamp)
            }
            SignalAction::None => Err(TradesimError::InvalidTrade {
                reason: "cannot record a None action".to_string(),
            }),
        }
    }

    fn open_position(
        &mut self,
        instrument: &str,
        action: SignalAction,
        quantity: i64,
        price: f64,
        commission: f64,
        timestamp: NaiveDateTime,
    ) -> Result<(), TradesimError> {
        if self.positions.contains_key(instrument) {
            return Err(TradesimError::InvalidTrade {
                reason: format!("{instrument} already has an open position"),
            });
        }

        let entering_long = action == SignalAction::EnterLong;
        let value = price * quantity as f64;
        // A buy spends value plus commission; a short sale credits the
        // proceeds but still pays commission.
        let cash_delta = if entering_long {
            -(value + commission)
        } else {
            value - commission
        };
        let new_cash = self.cash + cash_delta;
        if new_cash < 0.0 {
            return Err(TradesimError::InsufficientCash {
                required: -cash_delta,
                available: self.cash,
            });
        }

        let signed_quantity = if entering_long { quantity } else { -quantity };
        self.cash = new_cash;
        self.positions.insert(
            instrument.to_string(),
            OpenPosition {
                entry_time: timestamp,
                entry_price: price,
                quantity: signed_quantity,
                entry_commission: commission,
            },
        );
        self.total_executions += 1;
        debug!("{instrument}: {action} {quantity} @ {price:.4}, cash {:.2}", self.cash);
        Ok(())
    }

    fn close_position(
        &mut self,
        instrument: &str,
        action: SignalAction,
        quantity: i64,
        price: f64,
        commission: f64,
        timestamp: NaiveDateTime,
    ) -> Result<(), TradesimError> {
        let position = self.positions.get(instrument).ok_or_else(|| {
            TradesimError::InvalidTrade {
                reason: format!("{instrument} has no open position to exit"),
            }
        })?;

        let held_long = position.quantity > 0;
        let side_matches = held_long == (action == SignalAction::ExitLong);
        if !side_matches {
            return Err(TradesimError::InvalidTrade {
                reason: format!("{instrument}: exit side does not match held position"),
            });
        }
        if quantity != position.quantity.abs() {
            return Err(TradesimError::InvalidTrade {
                reason: format!(
                    "{instrument}: partial exits unsupported, expected {} got {quantity}",
                    position.quantity.abs()
                ),
            });
        }

        let value = price * quantity as f64;
        // Selling to close a long credits proceeds; buying to close a short
        // spends them.
        let cash_delta = if held_long {
            value - commission
        } else {
            -(value + commission)
        };
        let new_cash = self.cash + cash_delta;
        if new_cash < 0.0 {
            return Err(TradesimError::InsufficientCash {
                required: -cash_delta,
                available: self.cash,
            });
        }

        let position = position.clone();
        self.positions.remove(instrument);
        self.cash = new_cash;
        self.total_executions += 1;

        let entry_value = position.entry_price * quantity as f64;
        let exit_value = price * quantity as f64;
        let total_commission = position.entry_commission + commission;
        let pnl = if held_long {
            exit_value - entry_value - total_commission
        } else {
            entry_value - exit_value - total_commission
        };
        // Plain ratio of PnL to capital at risk; display layers scale it.
        let return_pct = if entry_value.abs() > MIN_PRICE {
            pnl / entry_value.abs()
        } else {
            0.0
        };

        debug!(
            "{instrument}: {action} {quantity} @ {price:.4}, pnl {pnl:.2}, cash {:.2}",
            self.cash
        );
        self.trades.push(Trade {
            instrument: instrument.to_string(),
            entry_action: if held_long {
                SignalAction::EnterLong
            } else {
                SignalAction::EnterShort
            },
            entry_time: position.entry_time,
            exit_time: timestamp,
            quantity,
            entry_price: position.entry_price,
            exit_price: price,
            commission: total_commission,
            pnl,
            return_pct,
        });
        Ok(())
    }

    /// Marks open positions to the given prices and returns total equity.
    /// Positions with no price in the map contribute nothing.
    pub fn current_equity(&self, prices: &HashMap<String, f64>) -> f64 {
        self.cash + self.positions_value(prices)
    }

    fn positions_value(&self, prices: &HashMap<String, f64>) -> f64 {
        self.positions
            .iter()
            .map(|(instrument, position)| match prices.get(instrument) {
                Some(&price) => position.quantity as f64 * price,
                None => {
                    warn!("{instrument}: no price for equity mark, contributing 0");
                    0.0
                }
            })
            .sum()
    }

    /// Appends an equity-curve point for `timestamp`. Recording the same
    /// timestamp again is a no-op; the first value for a bar stands.
    pub fn record_timestamp_value(
        &mut self,
        timestamp: NaiveDateTime,
        prices: &HashMap<String, f64>,
    ) {
        if self
            .equity_curve
            .last()
            .is_some_and(|last| last.timestamp == timestamp)
        {
            return;
        }
        let positions_value = self.positions_value(prices);
        self.equity_curve.push(PortfolioState {
            timestamp,
            cash: self.cash,
            positions_value,
            total_equity: self.cash + positions_value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn new_portfolio() {
        let p = Portfolio::new(100_000.0);
        assert!((p.cash() - 100_000.0).abs() < f64::EPSILON);
        assert!(p.trades().is_empty());
        assert!(p.equity_curve().is_empty());
        assert_eq!(p.total_executions(), 0);
    }

    #[test]
    fn long_round_trip() {
        let mut p = Portfolio::new(100_000.0);
        p.record_trade("ACME", SignalAction::EnterLong, 100, 50.0, 1.0, ts(1))
            .unwrap();
        assert!((p.cash() - (100_000.0 - 5000.0 - 1.0)).abs() < 1e-9);
        assert!(p.position("ACME").is_some());
        assert_eq!(p.position("ACME").unwrap().quantity, 100);

        p.record_trade("ACME", SignalAction::ExitLong, 100, 60.0, 1.0, ts(5))
            .unwrap();
        assert!(p.position("ACME").is_none());
        assert_eq!(p.trades().len(), 1);
        assert_eq!(p.total_executions(), 2);

        let trade = &p.trades()[0];
        // 6000 - 5000 - 2 commission
        assert!((trade.pnl - 998.0).abs() < 1e-9);
        assert!((trade.return_pct - 998.0 / 5000.0).abs() < 1e-9);
        assert!((p.cash() - (100_000.0 + 998.0)).abs() < 1e-9);
    }

    #[test]
    fn trade_return_is_pnl_over_entry_value() {
        let mut p = Portfolio::new(100_000.0);
        p.record_trade("ACME", SignalAction::EnterLong, 100, 50.0, 0.0, ts(1))
            .unwrap();
        p.record_trade("ACME", SignalAction::ExitLong, 100, 60.0, 0.0, ts(2))
            .unwrap();
        // 1000 PnL on 5000 at risk is a 0.2 ratio, not 20.
        assert!((p.trades()[0].return_pct - 0.2).abs() < 1e-9);
    }

    #[test]
    fn short_round_trip() {
        let mut p = Portfolio::new(100_000.0);
        p.record_trade("ACME", SignalAction::EnterShort, 100, 50.0, 1.0, ts(1))
            .unwrap();
        // Short sale credits proceeds minus commission.
        assert!((p.cash() - (100_000.0 + 5000.0 - 1.0)).abs() < 1e-9);
        assert_eq!(p.position("ACME").unwrap().quantity, -100);

        p.record_trade("ACME", SignalAction::ExitShort, 100, 40.0, 1.0, ts(5))
            .unwrap();
        let trade = &p.trades()[0];
        // 5000 - 4000 - 2 commission
        assert!((trade.pnl - 998.0).abs() < 1e-9);
        assert_eq!(trade.entry_action, SignalAction::EnterShort);
        assert!((p.cash() - (100_000.0 + 998.0)).abs() < 1e-9);
    }

    #[test]
    fn rejects_unaffordable_entry() {
        let mut p = Portfolio::new(1000.0);
        let err = p.record_trade("ACME", SignalAction::EnterLong, 100, 50.0, 1.0, ts(1));
        assert!(matches!(err, Err(TradesimError::InsufficientCash { .. })));
        // Ledger unchanged.
        assert!((p.cash() - 1000.0).abs() < f64::EPSILON);
        assert!(p.position("ACME").is_none());
        assert_eq!(p.total_executions(), 0);
    }

    #[test]
    fn rejects_double_entry() {
        let mut p = Portfolio::new(100_000.0);
        p.record_trade("ACME", SignalAction::EnterLong, 10, 50.0, 0.1, ts(1))
            .unwrap();
        let err = p.record_trade("ACME", SignalAction::EnterLong, 10, 50.0, 0.1, ts(2));
        assert!(matches!(err, Err(TradesimError::InvalidTrade { .. })));
    }

    #[test]
    fn rejects_exit_without_position() {
        let mut p = Portfolio::new(100_000.0);
        let err = p.record_trade("ACME", SignalAction::ExitLong, 10, 50.0, 0.1, ts(1));
        assert!(matches!(err, Err(TradesimError::InvalidTrade { .. })));
    }

    #[test]
    fn rejects_wrong_side_exit() {
        let mut p = Portfolio::new(100_000.0);
        p.record_trade("ACME", SignalAction::EnterLong, 10, 50.0, 0.1, ts(1))
            .unwrap();
        let err = p.record_trade("ACME", SignalAction::ExitShort, 10, 55.0, 0.1, ts(2));
        assert!(matches!(err, Err(TradesimError::InvalidTrade { .. })));
        assert!(p.position("ACME").is_some());
    }

    #[test]
    fn rejects_partial_exit() {
        let mut p = Portfolio::new(100_000.0);
        p.record_trade("ACME", SignalAction::EnterLong, 10, 50.0, 0.1, ts(1))
            .unwrap();
        let err = p.record_trade("ACME", SignalAction::ExitLong, 5, 55.0, 0.1, ts(2));
        assert!(matches!(err, Err(TradesimError::InvalidTrade { .. })));
    }

    #[test]
    fn rejects_nonpositive_quantity_and_price() {
        let mut p = Portfolio::new(100_000.0);
        assert!(p
            .record_trade("ACME", SignalAction::EnterLong, 0, 50.0, 0.1, ts(1))
            .is_err());
        assert!(p
            .record_trade("ACME", SignalAction::EnterLong, 10, 0.0, 0.1, ts(1))
            .is_err());
    }

    #[test]
    fn equity_marks_open_positions() {
        let mut p = Portfolio::new(100_000.0);
        p.record_trade("ACME", SignalAction::EnterLong, 100, 50.0, 0.0, ts(1))
            .unwrap();

        let mut prices = HashMap::new();
        prices.insert("ACME".to_string(), 55.0);
        // 95,000 cash + 100 * 55.
        assert!((p.current_equity(&prices) - 100_500.0).abs() < 1e-9);

        // Missing price contributes 0.
        let empty = HashMap::new();
        assert!((p.current_equity(&empty) - 95_000.0).abs() < 1e-9);
    }

    #[test]
    fn equity_recording_is_idempotent_per_timestamp() {
        let mut p = Portfolio::new(100_000.0);
        let prices = HashMap::new();
        p.record_timestamp_value(ts(1), &prices);
        p.record_timestamp_value(ts(1), &prices);
        assert_eq!(p.equity_curve().len(), 1);

        p.record_timestamp_value(ts(2), &prices);
        assert_eq!(p.equity_curve().len(), 2);
        assert!((p.equity_curve()[1].total_equity - 100_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn duplicate_timestamp_keeps_first_point() {
        let mut p = Portfolio::new(100_000.0);
        let prices = HashMap::new();
        p.record_timestamp_value(ts(1), &prices);
        p.record_trade("ACME", SignalAction::EnterLong, 100, 50.0, 0.0, ts(1))
            .unwrap();
        p.record_timestamp_value(ts(1), &prices);

        // The point written before the fill stands.
        assert_eq!(p.equity_curve().len(), 1);
        assert!((p.equity_curve()[0].total_equity - 100_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn short_equity_is_negative_position_value() {
        let mut p = Portfolio::new(100_000.0);
        p.record_trade("ACME", SignalAction::EnterShort, 100, 50.0, 0.0, ts(1))
            .unwrap();
        let mut prices = HashMap::new();
        prices.insert("ACME".to_string(), 40.0);
        // cash 105,000 plus -100 * 40.
        assert!((p.current_equity(&prices) - 101_000.0).abs() < 1e-9);
    }
}
