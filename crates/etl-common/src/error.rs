//! Error types shared by the ETL crates.

use thiserror::Error;

/// Result type alias using EtlError.
pub type EtlResult<T> = Result<T, EtlError>;

/// Errors raised by the shared value types.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Unknown spectral index: {0}")]
    UnknownIndex(String),

    #[error("Unknown band: {0}")]
    UnknownBand(String),
}

impl From<crate::CrsParseError> for EtlError {
    fn from(err: crate::CrsParseError) -> Self {
        EtlError::InvalidCrs(err.to_string())
    }
}

impl From<crate::TimeParseError> for EtlError {
    fn from(err: crate::TimeParseError) -> Self {
        EtlError::InvalidDateRange(err.to_string())
    }
}
