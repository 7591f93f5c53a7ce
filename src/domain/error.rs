//! Domain error types.
//!
//! `BacktestError` is fatal to a run. `OrderError` is a recoverable ledger
//! rejection: it is logged and absorbed within the bar that raised it.

use chrono::NaiveDate;

/// Top-level error type for barsim.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("invalid parameter {parameter}: {reason}")]
    Configuration { parameter: String, reason: String },

    #[error("data integrity error for {code} at {date}: {reason}")]
    DataIntegrity {
        code: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("malformed data in {file} line {line}: {reason}")]
    DataFormat {
        file: String,
        line: u64,
        reason: String,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BacktestError {
    pub fn configuration(parameter: &str, reason: impl Into<String>) -> Self {
        BacktestError::Configuration {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err {
            BacktestError::Io(_) => 1,
            BacktestError::Configuration { .. }
            | BacktestError::ConfigParse { .. }
            | BacktestError::ConfigMissing { .. } => 2,
            BacktestError::NoData { .. }
            | BacktestError::DataFormat { .. }
            | BacktestError::DataIntegrity { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

/// Why the ledger refused an order.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("invalid order size {size} for {code}")]
    InvalidSize { code: String, size: i64 },

    #[error("insufficient cash for {code}: need {required:.2}, have {available:.2}")]
    InsufficientCash {
        code: String,
        required: f64,
        available: f64,
    },

    #[error("no open position in {code}")]
    NoPosition { code: String },

    #[error("no price marked for {code}")]
    NoPrice { code: String },
}
