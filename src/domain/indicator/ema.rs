//! Exponential moving average, SMA-seeded.

use super::{check_length, Indicator};
use crate::domain::candle::Candle;
use crate::domain::error::TradesimError;

#[derive(Debug)]
pub struct Ema {
    name: String,
    period: usize,
    result: Vec<f64>,
}

impl Ema {
    /// A zero period is clamped to 1, the smallest window that averages.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Ema {
            name: format!("EMA({period})"),
            period,
            result: Vec::new(),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn calculate(&mut self, candles: &[Candle]) -> Result<(), TradesimError> {
        check_length(&self.name, candles, self.lookback())?;

        let alpha = 2.0 / (self.period as f64 + 1.0);
        let seed: f64 =
            candles[..self.period].iter().map(|c| c.close).sum::<f64>() / self.period as f64;

        let mut out = Vec::with_capacity(candles.len() - self.lookback());
        out.push(seed);
        let mut ema = seed;
        for candle in &candles[self.period..] {
            ema = alpha * candle.close + (1.0 - alpha) * ema;
            out.push(ema);
        }
        self.result = out;
        Ok(())
    }

    fn result(&self) -> &[f64] {
        &self.result
    }
}
