//! Relative strength index with Wilder smoothing.

use super::{check_length, Indicator};
use crate::domain::candle::Candle;
use crate::domain::error::TradesimError;

#[derive(Debug)]
pub struct Rsi {
    name: String,
    period: usize,
    result: Vec<f64>,
}

impl Rsi {
    /// A zero period is clamped to 1 so the averages stay well defined.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Rsi {
            name: format!("RSI({period})"),
            period,
            result: Vec::new(),
        }
    }
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    // The first output consumes `period` close-to-close changes, so it sits
    // one bar later than an SMA of the same period.
    fn lookback(&self) -> usize {
        self.period
    }

    fn calculate(&mut self, candles: &[Candle]) -> Result<(), TradesimError> {
        check_length(&self.name, candles, self.lookback())?;

        let mut gain_sum = 0.0;
        let mut loss_sum = 0.0;
        for window in candles[..=self.period].windows(2) {
            let change = window[1].close - window[0].close;
            if change > 0.0 {
                gain_sum += change;
            } else {
                loss_sum -= change;
            }
        }
        let mut avg_gain = gain_sum / self.period as f64;
        let mut avg_loss = loss_sum / self.period as f64;

        let mut out = Vec::with_capacity(candles.len() - self.period);
        out.push(rsi_from(avg_gain, avg_loss));

        for window in candles[self.period..].windows(2) {
            let change = window[1].close - window[0].close;
            let (gain, loss) = if change > 0.0 {
                (change, 0.0)
            } else {
                (0.0, -change)
            };
            avg_gain = (avg_gain * (self.period as f64 - 1.0) + gain) / self.period as f64;
            avg_loss = (avg_loss * (self.period as f64 - 1.0) + loss) / self.period as f64;
            out.push(rsi_from(avg_gain, avg_loss));
        }
        self.result = out;
        Ok(())
    }

    fn result(&self) -> &[f64] {
        &self.result
    }
}
