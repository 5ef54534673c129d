// src/error.rs
//
// Errors surface only from configuration entry points. Frame ingestion,
// pruning and result queries resolve every anomaly by policy instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// No identity codes were supplied, so the reference length is undefined.
    #[error("identity code set is empty")]
    EmptyCodeSet,

    #[error("identity code {index} is empty")]
    EmptyCode { index: usize },

    /// All codes must share one length; it sets the result window and history cap.
    #[error("identity code {index} has length {found}, expected {expected}")]
    CodeLengthMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("identity code {index} contains invalid symbol {symbol:?}")]
    InvalidCode { index: usize, symbol: char },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
