//! Errors raised by the barometer pipeline and regime model.

/// Errors from the pure computation layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Input data has the wrong shape: missing series, duplicate dates,
    /// or too few rows to produce a reading.
    #[error("data shape error: {0}")]
    DataShape(String),

    /// The indicator is at or above the highest configured threshold.
    #[error("indicator value {value} is not below any threshold (highest: {highest})")]
    UnclassifiedRegime { value: f64, highest: f64 },

    /// Levels, features or strategies violate their invariants.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
