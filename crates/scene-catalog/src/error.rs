//! Error types for scene discovery.

use thiserror::Error;

/// Errors produced while searching the scene catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("catalog returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse catalog response: {0}")]
    Parse(String),

    #[error("invalid scene {id}: {reason}")]
    InvalidScene { id: String, reason: String },

    #[error("invalid geometry: {0}")]
    Geometry(String),
}

/// Result alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
