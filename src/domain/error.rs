//! Domain error types.

use chrono::NaiveDate;

/// Malformed market or weight input. These are preconditions of the engine,
/// so they fail fast instead of being corrected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataIntegrityError {
    #[error("days not strictly increasing in {context}: {current} follows {previous}")]
    NonMonotonicDays {
        context: String,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("duplicate entry for {asset} on {date}")]
    DuplicateEntry { asset: String, date: NaiveDate },

    #[error("duplicate asset {0}")]
    DuplicateAsset(String),

    #[error("non-positive close {value} for {asset} on {date}")]
    NonPositivePrice {
        asset: String,
        date: NaiveDate,
        value: f64,
    },

    #[error("is_liquid must be 0 or 1, got {value} for {asset} on {date}")]
    InvalidLiquidity {
        asset: String,
        date: NaiveDate,
        value: f64,
    },

    #[error("shape mismatch: expected {expected} cells, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("weights are not aligned with market data: {reason}")]
    Misaligned { reason: String },
}

/// Top-level error type for breadthtrader.
#[derive(Debug, thiserror::Error)]
pub enum BreadthtraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),

    #[error("no data for {asset}")]
    NoData { asset: String },

    #[error("output error: {reason}")]
    Output { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&BreadthtraderError> for std::process::ExitCode {
    fn from(err: &BreadthtraderError) -> Self {
        let code: u8 = match err {
            BreadthtraderError::Io(_) => 1,
            BreadthtraderError::ConfigParse { .. }
            | BreadthtraderError::ConfigMissing { .. }
            | BreadthtraderError::ConfigInvalid { .. } => 2,
            BreadthtraderError::DataSource { .. } => 3,
            BreadthtraderError::DataIntegrity(_) => 4,
            BreadthtraderError::NoData { .. } => 5,
            BreadthtraderError::Output { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
