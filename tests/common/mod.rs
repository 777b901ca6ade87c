#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;

use tradesim::domain::candle::Candle;
use tradesim::domain::error::TradesimError;
use tradesim::ports::CandleStore;

/// In-memory store keyed by (instrument, interval).
pub struct MemoryStore {
    data: HashMap<(String, String), Vec<Candle>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn with_candles(mut self, instrument: &str, interval: &str, candles: Vec<Candle>) -> Self {
        self.data
            .insert((instrument.to_string(), interval.to_string()), candles);
        self
    }
}

impl CandleStore for MemoryStore {
    fn query_candles(
        &self,
        instrument: &str,
        interval: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Candle>, TradesimError> {
        let mut candles = self
            .data
            .get(&(instrument.to_string(), interval.to_string()))
            .cloned()
            .unwrap_or_default();
        candles.retain(|c| c.timestamp >= start && c.timestamp <= end);
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }

    fn save_candles(
        &mut self,
        instrument: &str,
        interval: &str,
        candles: &[Candle],
    ) -> Result<(), TradesimError> {
        let series = self
            .data
            .entry((instrument.to_string(), interval.to_string()))
            .or_default();
        for candle in candles {
            match series.iter_mut().find(|c| c.timestamp == candle.timestamp) {
                Some(existing) => *existing = candle.clone(),
                None => series.push(candle.clone()),
            }
        }
        series.sort_by_key(|c| c.timestamp);
        Ok(())
    }
}

pub fn day(offset: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(offset)
}

/// One candle per day starting 2024-01-01, flat OHLC at the given close.
pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            timestamp: day(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 10_000,
            open_interest: None,
        })
        .collect()
}

/// A series that ramps linearly from `start` by `step` per bar.
pub fn ramp(start: f64, step: f64, bars: usize) -> Vec<f64> {
    (0..bars).map(|i| start + step * i as f64).collect()
}
