//! Run-settings loader: INI file describing one backtest run.
//!
//! ```ini
//! [backtest]
//! start_date = 2024-01-01
//! end_date = 2024-06-30
//! initial_capital = 100000
//! commission_per_share = 0.01
//!
//! [data]
//! csv_dir = ./data
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use configparser::ini::Ini;
use std::path::{Path, PathBuf};

use crate::domain::error::TradesimError;

const DEFAULT_COMMISSION_PER_SHARE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub initial_capital: f64,
    pub commission_per_share: f64,
    pub csv_dir: PathBuf,
}

impl RunSettings {
    pub fn from_file(path: &Path) -> Result<Self, TradesimError> {
        let mut ini = Ini::new();
        ini.load(path).map_err(|e| TradesimError::ConfigParse {
            file: path.display().to_string(),
            reason: e,
        })?;
        Self::from_ini(&ini, &path.display().to_string())
    }

    pub fn from_string(content: &str, label: &str) -> Result<Self, TradesimError> {
        let mut ini = Ini::new();
        ini.read(content.to_string())
            .map_err(|e| TradesimError::ConfigParse {
                file: label.to_string(),
                reason: e,
            })?;
        Self::from_ini(&ini, label)
    }

    fn from_ini(ini: &Ini, file: &str) -> Result<Self, TradesimError> {
        let parse_err = |reason: String| TradesimError::ConfigParse {
            file: file.to_string(),
            reason,
        };

        let start_date = require(ini, file, "backtest", "start_date")?;
        let end_date = require(ini, file, "backtest", "end_date")?;
        let start = parse_date(&start_date, false).map_err(&parse_err)?;
        // A bare end date is inclusive: cover the whole final day.
        let end = parse_date(&end_date, true).map_err(&parse_err)?;
        if start > end {
            return Err(parse_err(format!(
                "start_date {start_date} is after end_date {end_date}"
            )));
        }

        let initial_capital = ini
            .getfloat("backtest", "initial_capital")
            .map_err(|e| parse_err(format!("invalid initial_capital: {e}")))?
            .ok_or_else(|| parse_err("missing [backtest] initial_capital".to_string()))?;
        if initial_capital <= 0.0 {
            return Err(parse_err(format!(
                "initial_capital {initial_capital} must be positive"
            )));
        }

        let commission_per_share = ini
            .getfloat("backtest", "commission_per_share")
            .map_err(|e| parse_err(format!("invalid commission_per_share: {e}")))?
            .unwrap_or(DEFAULT_COMMISSION_PER_SHARE);
        if commission_per_share < 0.0 {
            return Err(parse_err(format!(
                "commission_per_share {commission_per_share} must not be negative"
            )));
        }

        let csv_dir = PathBuf::from(require(ini, file, "data", "csv_dir")?);

        Ok(RunSettings {
            start,
            end,
            initial_capital,
            commission_per_share,
            csv_dir,
        })
    }
}

fn require(ini: &Ini, file: &str, section: &str, key: &str) -> Result<String, TradesimError> {
    ini.get(section, key)
        .ok_or_else(|| TradesimError::ConfigParse {
            file: file.to_string(),
            reason: format!("missing [{section}] {key}"),
        })
}

fn parse_date(raw: &str, end_of_day: bool) -> Result<NaiveDateTime, String> {
    // Either a bare date or a full timestamp.
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt);
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{raw}': {e}"))?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    Ok(time.unwrap_or_default())
}
