//! Indicator capability: the `Indicator` trait, concrete implementations,
//! and the name factory.
//!
//! Results are left-aligned: an indicator with lookback `k` over `n` candles
//! produces `n - k` values, and `result()[i]` belongs to `candles[i + k]`.
//! The driver does the index arithmetic; indicators only promise alignment.

mod ema;
mod rsi;
mod sma;

pub use ema::Ema;
pub use rsi::Rsi;
pub use sma::Sma;

use super::candle::Candle;
use super::error::TradesimError;

pub trait Indicator {
    /// Canonical name, e.g. `"SMA(10)"`. Keys the snapshot maps.
    fn name(&self) -> &str;

    /// Bars consumed before the first output value exists.
    fn lookback(&self) -> usize;

    /// Computes the full series. Errors if the input is shorter than
    /// `lookback + 1` bars; any previous result is replaced.
    fn calculate(&mut self, candles: &[Candle]) -> Result<(), TradesimError>;

    /// The computed series, empty until `calculate` succeeds.
    fn result(&self) -> &[f64];
}

/// Splits `"SMA(10)"` into `("SMA", 10)`. Base names are matched
/// case-sensitively by `create_indicator`; the period must be a positive
/// integer.
pub fn parse_indicator_name(name: &str) -> Result<(&str, usize), TradesimError> {
    let invalid = || TradesimError::UnknownIndicator {
        name: name.to_string(),
    };
    let open = name.find('(').ok_or_else(invalid)?;
    let close = name.rfind(')').ok_or_else(invalid)?;
    if close != name.len() - 1 || open == 0 || close <= open + 1 {
        return Err(invalid());
    }
    let base = &name[..open];
    let period: usize = name[open + 1..close].parse().map_err(|_| invalid())?;
    if period == 0 {
        return Err(invalid());
    }
    Ok((base, period))
}

/// Builds an indicator from its canonical name.
pub fn create_indicator(name: &str) -> Result<Box<dyn Indicator>, TradesimError> {
    let (base, period) = parse_indicator_name(name)?;
    match base {
        "SMA" => Ok(Box::new(Sma::new(period))),
        "EMA" => Ok(Box::new(Ema::new(period))),
        "RSI" => Ok(Box::new(Rsi::new(period))),
        _ => Err(TradesimError::UnknownIndicator {
            name: name.to_string(),
        }),
    }
}

/// Shared guard: input must cover the lookback plus one output bar.
fn check_length(name: &str, candles: &[Candle], lookback: usize) -> Result<(), TradesimError> {
    if candles.len() <= lookback {
        return Err(TradesimError::InsufficientData {
            name: name.to_string(),
            bars: candles.len(),
            lookback,
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn close_candles(closes: &[f64]) -> Vec<Candle> {
    use chrono::{Duration, NaiveDate};
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            timestamp: start + Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000,
            open_interest: None,
        })
        .collect()
}
