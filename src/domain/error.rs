//! Domain error types.
//!
//! Four classes: configuration, data loading, calculation, execution.
//! The first three are fatal to a run; execution errors only suppress the
//! one trade that raised them.

/// Top-level error type for tradesim.
#[derive(Debug, thiserror::Error)]
pub enum TradesimError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid strategy config: {reason}")]
    StrategyInvalid { reason: String },

    #[error("unknown indicator: {name}")]
    UnknownIndicator { name: String },

    #[error("invalid sizing: {reason}")]
    SizingInvalid { reason: String },

    #[error("candle store error: {reason}")]
    Store { reason: String },

    #[error("no data for {instrument} ({interval}) in requested range")]
    NoData { instrument: String, interval: String },

    #[error("insufficient data: have {bars} bars, indicator {name} needs lookback {lookback}")]
    InsufficientData {
        name: String,
        bars: usize,
        lookback: usize,
    },

    #[error("invalid trade: {reason}")]
    InvalidTrade { reason: String },

    #[error("insufficient cash: need {required:.2}, have {available:.2}")]
    InsufficientCash { required: f64, available: f64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TradesimError {
    /// Execution errors are recovered locally (the one trade is skipped);
    /// everything else aborts the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            TradesimError::InvalidTrade { .. } | TradesimError::InsufficientCash { .. }
        )
    }

    /// Process exit code for this error class: 1 I/O, 2 configuration,
    /// 3 data loading, 4 calculation, 5 execution.
    pub fn exit_code(&self) -> u8 {
        match self {
            TradesimError::Io(_) => 1,
            TradesimError::ConfigParse { .. }
            | TradesimError::StrategyInvalid { .. }
            | TradesimError::UnknownIndicator { .. }
            | TradesimError::SizingInvalid { .. } => 2,
            TradesimError::Store { .. } | TradesimError::NoData { .. } => 3,
            TradesimError::InsufficientData { .. } => 4,
            TradesimError::InvalidTrade { .. } | TradesimError::InsufficientCash { .. } => 5,
        }
    }
}

impl From<&TradesimError> for std::process::ExitCode {
    fn from(err: &TradesimError) -> Self {
        std::process::ExitCode::from(err.exit_code())
    }
}
