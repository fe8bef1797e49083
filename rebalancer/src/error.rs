//! Error types for the rebalancer.

use std::path::PathBuf;

use volbarometer_broker::BrokerError;

/// All errors that can occur during rebalancer operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("data fetch failed for {source_name}: {reason}")]
    DataFetch { source_name: String, reason: String },

    #[error("malformed data: {0}")]
    DataShape(String),

    #[error("barometer value {value} is not below the highest threshold {highest}")]
    UnclassifiedRegime { value: f64, highest: f64 },

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("a rebalance is already in progress")]
    Busy,

    #[error("execution aborted: {0}")]
    Aborted(String),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),
}

impl From<volbarometer::Error> for Error {
    fn from(e: volbarometer::Error) -> Self {
        match e {
            volbarometer::Error::DataShape(msg) => Error::DataShape(msg),
            volbarometer::Error::UnclassifiedRegime { value, highest } => {
                Error::UnclassifiedRegime { value, highest }
            }
            volbarometer::Error::InvalidConfig(msg) => Error::Config(msg),
        }
    }
}

impl Error {
    /// Short machine-readable kind, used in audit events and HTTP bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::ConfigRead { .. } | Error::ConfigParse(_) => "config",
            Error::DataFetch { .. } => "data_fetch",
            Error::DataShape(_) => "data_shape",
            Error::UnclassifiedRegime { .. } => "unclassified_regime",
            Error::Broker(_) => "broker",
            Error::Busy => "busy",
            Error::Aborted(_) => "aborted",
            Error::Audit(_) => "audit",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
