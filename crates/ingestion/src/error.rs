//! Error types for the ingestion crate.

use thiserror::Error;

use raster::RasterError;
use scene_catalog::CatalogError;
use storage::StorageError;

/// Invalid parcel boundaries and out-of-domain buffer inputs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Failed to parse WKT: {0}")]
    Parse(String),

    #[error("Expected a polygon, got {0}")]
    NotPolygon(String),

    #[error("Degenerate polygon: {0}")]
    Degenerate(String),

    #[error("Distance must be non-negative, got {0}")]
    NegativeDistance(f64),

    #[error("Latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
}

/// Errors that can occur during a pipeline run.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read input: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InputFormat(String),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<csv::Error> for IngestionError {
    fn from(e: csv::Error) -> Self {
        IngestionError::InputFormat(e.to_string())
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
