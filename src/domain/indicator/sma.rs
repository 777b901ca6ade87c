//! Simple moving average over close prices.

use super::{check_length, Indicator};
use crate::domain::candle::Candle;
use crate::domain::error::TradesimError;

#[derive(Debug)]
pub struct Sma {
    name: String,
    period: usize,
    result: Vec<f64>,
}

impl Sma {
    /// A zero period is clamped to 1, the smallest window that averages.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Sma {
            name: format!("SMA({period})"),
            period,
            result: Vec::new(),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn calculate(&mut self, candles: &[Candle]) -> Result<(), TradesimError> {
        check_length(&self.name, candles, self.lookback())?;

        // Rolling window sum; one add and one subtract per bar.
        let mut sum: f64 = candles[..self.period].iter().map(|c| c.close).sum();
        let mut out = Vec::with_capacity(candles.len() - self.lookback());
        out.push(sum / self.period as f64);
        for i in self.period..candles.len() {
            sum += candles[i].close - candles[i - self.period].close;
            out.push(sum / self.period as f64);
        }
        self.result = out;
        Ok(())
    }

    fn result(&self) -> &[f64] {
        &self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::close_candles;
    use approx::assert_relative_eq;

    #[test]
    fn three_period_average() {
        let candles = close_candles(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut sma = Sma::new(3);
        sma.calculate(&candles).unwrap();

        // Aligned: result[0] belongs to candles[2].
        assert_eq!(sma.result().len(), 3);
        assert_relative_eq!(sma.result()[0], 2.0);
        assert_relative_eq!(sma.result()[1], 3.0);
        assert_relative_eq!(sma.result()[2], 4.0);
    }

    #[test]
    fn period_one_is_identity() {
        let candles = close_candles(&[5.0, 6.0, 7.0]);
        let mut sma = Sma::new(1);
        sma.calculate(&candles).unwrap();
        assert_eq!(sma.result(), &[5.0, 6.0, 7.0]);
    }

    #[test]
    fn zero_period_clamps_to_one() {
        let candles = close_candles(&[5.0, 6.0, 7.0]);
        let mut sma = Sma::new(0);
        assert_eq!(sma.name(), "SMA(1)");
        assert_eq!(sma.lookback(), 0);
        sma.calculate(&candles).unwrap();
        assert_eq!(sma.result(), &[5.0, 6.0, 7.0]);
    }

    #[test]
    fn insufficient_data() {
        let candles = close_candles(&[1.0, 2.0]);
        let mut sma = Sma::new(3);
        let err = sma.calculate(&candles);
        assert!(matches!(err, Err(TradesimError::InsufficientData { .. })));
        assert!(sma.result().is_empty());
    }

    #[test]
    fn recalculate_replaces_result() {
        let mut sma = Sma::new(2);
        sma.calculate(&close_candles(&[1.0, 3.0, 5.0])).unwrap();
        assert_eq!(sma.result().len(), 2);
        sma.calculate(&close_candles(&[10.0, 20.0])).unwrap();
        assert_eq!(sma.result(), &[15.0]);
    }
}
