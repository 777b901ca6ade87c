//! Market data primitives: candles, signal actions, position states.

use chrono::NaiveDateTime;
use std::fmt;

/// One OHLCV observation for an instrument over a fixed interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub open_interest: Option<i64>,
}

/// Action emitted by a strategy for a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum SignalAction {
    None,
    EnterLong,
    ExitLong,
    EnterShort,
    ExitShort,
}

impl SignalAction {
    pub fn is_entry(self) -> bool {
        matches!(self, SignalAction::EnterLong | SignalAction::EnterShort)
    }

    pub fn is_exit(self) -> bool {
        matches!(self, SignalAction::ExitLong | SignalAction::ExitShort)
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalAction::None => "None",
            SignalAction::EnterLong => "EnterLong",
            SignalAction::ExitLong => "ExitLong",
            SignalAction::EnterShort => "EnterShort",
            SignalAction::ExitShort => "ExitShort",
        };
        f.write_str(s)
    }
}

/// Net position side for one (strategy, instrument) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Long,
    Short,
}

impl PositionState {
    /// The state reached by applying `action`, or `None` if the action is
    /// not legal from this state. Flips (Long -> Short) always require an
    /// explicit exit first.
    pub fn apply(self, action: SignalAction) -> Option<PositionState> {
        match (self, action) {
            (state, SignalAction::None) => Some(state),
            (PositionState::Flat, SignalAction::EnterLong) => Some(PositionState::Long),
            (PositionState::Flat, SignalAction::EnterShort) => Some(PositionState::Short),
            (PositionState::Long, SignalAction::ExitLong) => Some(PositionState::Flat),
            (PositionState::Short, SignalAction::ExitShort) => Some(PositionState::Flat),
            _ => None,
        }
    }
}
