//! Spectral index ingestion library.
//!
//! Turns parcel boundaries into per-date NDVI/NDMI rasters stored with the
//! parcel in PostGIS.
//!
//! # Architecture
//!
//! For each parcel, in input order:
//!
//! - [`geometry`]: hole removal, reprojection to lon/lat, buffered search window
//! - scene search and per-date selection (`scene-catalog`)
//! - band stack on the target grid (`raster`)
//! - [`cloud_mask`] and [`index`]: masked normalized differences
//! - [`serialize`]: one GeoTIFF row per non-empty date
//! - atomic load of the parcel and its rows (`storage`)
//!
//! Storage maintenance runs once after the batch. [`PipelineDriver`] ties it
//! together and returns a [`BatchReport`].

pub mod cloud_mask;
pub mod config;
pub mod error;
pub mod geometry;
pub mod index;
pub mod input;
mod pipeline;
pub mod report;
pub mod serialize;

// Re-exports
pub use cloud_mask::{cloud_mask, MASKED_SCL_CLASSES};
pub use config::PipelineSettings;
pub use error::{GeometryError, IngestionError, Result};
pub use geometry::{meters_to_decimal_degrees, remove_polygon_holes, GeometryPreparer, PreparedParcel};
pub use index::{compute_index, normalized_difference, SpectralIndexArray};
pub use input::{read_parcels, read_parcels_from, ParcelColumns, ParcelRecord};
pub use pipeline::PipelineDriver;
pub use report::{BatchReport, ParcelOutcome, ParcelReport, Stage};
pub use serialize::serialize_index;
