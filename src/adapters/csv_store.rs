//! CSV-backed candle store.
//!
//! One file per (instrument, interval) pair under a base directory, named
//! `{instrument}_{interval}.csv` with a header row. Timestamps are
//! `YYYY-MM-DD HH:MM:SS`.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::domain::candle::Candle;
use crate::domain::error::TradesimError;
use crate::ports::CandleStore;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const HEADER: [&str; 7] = [
    "timestamp",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "open_interest",
];

pub struct CsvStore {
    base_path: PathBuf,
}

impl CsvStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument: &str, interval: &str) -> PathBuf {
        self.base_path
            .join(format!("{instrument}_{interval}.csv"))
    }

    fn load_all(&self, instrument: &str, interval: &str) -> Result<Vec<Candle>, TradesimError> {
        let path = self.csv_path(instrument, interval);
        let content = fs::read_to_string(&path).map_err(|e| TradesimError::Store {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| TradesimError::Store {
                reason: format!("CSV parse error in {}: {e}", path.display()),
            })?;
            candles.push(parse_record(&record)?);
        }
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

fn parse_record(record: &csv::StringRecord) -> Result<Candle, TradesimError> {
    let field = |idx: usize, name: &str| -> Result<&str, TradesimError> {
        record.get(idx).ok_or_else(|| TradesimError::Store {
            reason: format!("missing {name} column"),
        })
    };
    let parse_f64 = |idx: usize, name: &str| -> Result<f64, TradesimError> {
        field(idx, name)?.parse().map_err(|e| TradesimError::Store {
            reason: format!("invalid {name} value: {e}"),
        })
    };

    let timestamp = NaiveDateTime::parse_from_str(field(0, "timestamp")?, TIMESTAMP_FORMAT)
        .map_err(|e| TradesimError::Store {
            reason: format!("invalid timestamp: {e}"),
        })?;
    let volume: i64 = field(5, "volume")?.parse().map_err(|e| TradesimError::Store {
        reason: format!("invalid volume value: {e}"),
    })?;
    // Open interest column may be empty or absent for equities.
    let open_interest = match record.get(6) {
        Some("") | None => None,
        Some(raw) => Some(raw.parse().map_err(|e| TradesimError::Store {
            reason: format!("invalid open_interest value: {e}"),
        })?),
    };

    Ok(Candle {
        timestamp,
        open: parse_f64(1, "open")?,
        high: parse_f64(2, "high")?,
        low: parse_f64(3, "low")?,
        close: parse_f64(4, "close")?,
        volume,
        open_interest,
    })
}

impl CandleStore for CsvStore {
    fn query_candles(
        &self,
        instrument: &str,
        interval: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Candle>, TradesimError> {
        let mut candles = self.load_all(instrument, interval)?;
        candles.retain(|c| c.timestamp >= start && c.timestamp <= end);
        Ok(candles)
    }

    /// Merges by timestamp: a candle saved twice overwrites its earlier row
    /// rather than duplicating it. The whole file is rewritten sorted.
    fn save_candles(
        &mut self,
        instrument: &str,
        interval: &str,
        candles: &[Candle],
    ) -> Result<(), TradesimError> {
        let path = self.csv_path(instrument, interval);
        let mut merged: BTreeMap<NaiveDateTime, Candle> = if path.exists() {
            self.load_all(instrument, interval)?
                .into_iter()
                .map(|c| (c.timestamp, c))
                .collect()
        } else {
            BTreeMap::new()
        };
        for candle in candles {
            merged.insert(candle.timestamp, candle.clone());
        }

        let mut wtr = csv::Writer::from_path(&path).map_err(|e| TradesimError::Store {
            reason: format!("failed to open {} for writing: {e}", path.display()),
        })?;
        let write_err = |e: csv::Error| TradesimError::Store {
            reason: format!("failed to write {}: {e}", path.display()),
        };
        wtr.write_record(HEADER).map_err(write_err)?;
        for candle in merged.values() {
            wtr.write_record([
                candle.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                candle.open.to_string(),
                candle.high.to_string(),
                candle.low.to_string(),
                candle.close.to_string(),
                candle.volume.to_string(),
                candle
                    .open_interest
                    .map(|oi| oi.to_string())
                    .unwrap_or_default(),
            ])
            .map_err(write_err)?;
        }
        wtr.flush().map_err(|e| TradesimError::Store {
            reason: format!("failed to flush {}: {e}", path.display()),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn candle(day: u32, close: f64) -> Candle {
        Candle {
            timestamp: ts(day, 0),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
            open_interest: Some(42),
        }
    }

    fn setup() -> (TempDir, CsvStore) {
        let dir = TempDir::new().unwrap();
        let store = CsvStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[test]
    fn save_then_query_round_trip() {
        let (_dir, mut store) = setup();
        let candles = vec![candle(1, 100.0), candle(2, 101.0), candle(3, 102.0)];
        store.save_candles("ACME", "day", &candles).unwrap();

        let loaded = store
            .query_candles("ACME", "day", ts(1, 0), ts(3, 0))
            .unwrap();
        assert_eq!(loaded, candles);
    }

    #[test]
    fn query_filters_by_range() {
        let (_dir, mut store) = setup();
        store
            .save_candles(
                "ACME",
                "day",
                &[candle(1, 100.0), candle(2, 101.0), candle(3, 102.0)],
            )
            .unwrap();

        let loaded = store
            .query_candles("ACME", "day", ts(2, 0), ts(2, 0))
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].timestamp, ts(2, 0));
    }

    #[test]
    fn save_is_idempotent_on_timestamp() {
        let (_dir, mut store) = setup();
        store.save_candles("ACME", "day", &[candle(1, 100.0)]).unwrap();
        let mut revised = candle(1, 100.0);
        revised.close = 99.0;
        store.save_candles("ACME", "day", &[revised.clone()]).unwrap();

        let loaded = store
            .query_candles("ACME", "day", ts(1, 0), ts(1, 0))
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert!((loaded[0].close - 99.0).abs() < f64::EPSILON);
    }

    #[test]
    fn results_sorted_by_timestamp() {
        let (_dir, mut store) = setup();
        store
            .save_candles("ACME", "day", &[candle(3, 102.0), candle(1, 100.0)])
            .unwrap();
        store.save_candles("ACME", "day", &[candle(2, 101.0)]).unwrap();

        let loaded = store
            .query_candles("ACME", "day", ts(1, 0), ts(3, 0))
            .unwrap();
        let timestamps: Vec<_> = loaded.iter().map(|c| c.timestamp).collect();
        assert_eq!(timestamps, vec![ts(1, 0), ts(2, 0), ts(3, 0)]);
    }

    #[test]
    fn missing_file_is_a_store_error() {
        let (_dir, store) = setup();
        let err = store.query_candles("MISSING", "day", ts(1, 0), ts(3, 0));
        assert!(matches!(err, Err(TradesimError::Store { .. })));
    }

    #[test]
    fn empty_open_interest_loads_as_none() {
        let (dir, store) = setup();
        fs::write(
            dir.path().join("ACME_day.csv"),
            "timestamp,open,high,low,close,volume,open_interest\n\
             2024-01-01 00:00:00,100.0,101.0,99.0,100.5,1000,\n",
        )
        .unwrap();

        let loaded = store
            .query_candles("ACME", "day", ts(1, 0), ts(1, 0))
            .unwrap();
        assert_eq!(loaded[0].open_interest, None);
    }

    #[test]
    fn intervals_are_separate_files() {
        let (_dir, mut store) = setup();
        store.save_candles("ACME", "day", &[candle(1, 100.0)]).unwrap();
        store
            .save_candles("ACME", "minute", &[candle(1, 200.0)])
            .unwrap();

        let day = store
            .query_candles("ACME", "day", ts(1, 0), ts(1, 0))
            .unwrap();
        let minute = store
            .query_candles("ACME", "minute", ts(1, 0), ts(1, 0))
            .unwrap();
        assert!((day[0].close - 100.0).abs() < f64::EPSILON);
        assert!((minute[0].close - 200.0).abs() < f64::EPSILON);
    }
}
