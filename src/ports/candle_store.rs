//! Outbound port for candle storage.

use chrono::NaiveDateTime;

use crate::domain::candle::Candle;
use crate::domain::error::TradesimError;

/// Storage abstraction for historical candles. Implementations return
/// candles sorted ascending by timestamp; `save_candles` is idempotent on
/// (instrument, interval, timestamp).
pub trait CandleStore {
    fn query_candles(
        &self,
        instrument: &str,
        interval: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Candle>, TradesimError>;

    fn save_candles(
        &mut self,
        instrument: &str,
        interval: &str,
        candles: &[Candle],
    ) -> Result<(), TradesimError>;
}
