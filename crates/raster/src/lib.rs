//! Raster handling for the spectral ETL.
//!
//! - [`grid`]: the common target grid every band is resampled onto
//! - [`tiff`]: TIFF directory parsing and tile decoding shared by reader and writer
//! - [`cog`]: Cloud-Optimized GeoTIFF access through byte-range reads
//! - [`reader`]: the [`AssetReader`] seam used to fetch one band of one scene
//! - [`stack`]: eager band × time × row × column materialization
//! - [`geotiff`]: single-band Float64 GeoTIFF encoding for storage

pub mod cog;
pub mod error;
pub mod geotiff;
pub mod grid;
pub mod reader;
pub mod stack;
pub mod tiff;

pub use cog::{CogReader, HttpRangeSource, MemoryRangeSource, RangeSource};
pub use error::{RasterError, Result};
pub use geotiff::encode_geotiff;
pub use grid::{GeoTransform, TargetGrid};
pub use reader::{AssetReader, CogAssetReader};
pub use stack::{RasterStack, RasterStackBuilder};
