//! Error types for raster reading and encoding.

use thiserror::Error;

/// Errors produced while reading or encoding rasters.
#[derive(Error, Debug)]
pub enum RasterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("server does not support Range requests for {url}")]
    RangeNotSupported { url: String },

    #[error("invalid TIFF: {reason}")]
    InvalidTiff { reason: String },

    #[error("unsupported compression: {0}")]
    UnsupportedCompression(u16),

    #[error("unsupported data type: bits_per_sample={bps}, sample_format={sf}, predictor={predictor}")]
    UnsupportedDataType { bps: u16, sf: u16, predictor: u16 },

    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("scene {scene} has no '{band}' asset")]
    MissingAsset { scene: String, band: String },

    #[error("cannot determine CRS of {0}")]
    MissingCrs(String),

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error(transparent)]
    Crs(#[from] etl_common::CrsParseError),
}

/// Result alias for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;
