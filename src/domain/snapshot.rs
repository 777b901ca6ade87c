//! Per-bar view of the market handed to condition evaluation.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use super::candle::Candle;

/// Everything a condition may look at on one bar: the candle itself plus the
/// indicator values for this bar and the previous one. Built fresh by the
/// driver each iteration; the previous-bar map is what makes crossover
/// conditions expressible without giving conditions access to history.
#[derive(Debug)]
pub struct MarketSnapshot<'a> {
    pub timestamp: NaiveDateTime,
    pub candle: &'a Candle,
    pub indicator_values: &'a HashMap<String, f64>,
    pub previous_indicator_values: &'a HashMap<String, f64>,
}

impl<'a> MarketSnapshot<'a> {
    pub fn new(
        candle: &'a Candle,
        indicator_values: &'a HashMap<String, f64>,
        previous_indicator_values: &'a HashMap<String, f64>,
    ) -> Self {
        MarketSnapshot {
            timestamp: candle.timestamp,
            candle,
            indicator_values,
            previous_indicator_values,
        }
    }

    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicator_values.get(name).copied()
    }

    pub fn previous_indicator(&self, name: &str) -> Option<f64> {
        self.previous_indicator_values.get(name).copied()
    }
}
