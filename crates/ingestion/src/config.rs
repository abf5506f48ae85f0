//! Pipeline settings.
//!
//! Defaults reproduce the production run: parcels in Lambert-93, Sentinel-2
//! L2A from Earth Search, 10 m grid, NDVI and NDMI.

use serde::{Deserialize, Serialize};
use std::path::Path;

use etl_common::{Crs, SpectralIndex};

use crate::error::{IngestionError, Result};
use crate::input::ParcelColumns;

/// Area below which an interior ring is digitization noise, square meters.
pub const DEFAULT_HOLE_AREA_THRESHOLD: f64 = 1000.0;

/// Outward buffer around the search boundary, meters.
pub const DEFAULT_BUFFER_METERS: f64 = 15.0;

/// Constants consumed by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// CRS of input parcels, the stack grid and stored rasters
    pub target_crs: Crs,
    /// Grid resolution in target CRS units
    pub resolution: f64,
    pub buffer_meters: f64,
    pub hole_area_threshold: f64,
    pub collection: String,
    /// Maximum catalog items per parcel search
    pub catalog_limit: usize,
    /// Computed in this order
    pub indices: Vec<SpectralIndex>,
    pub id_column: String,
    pub geometry_column: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            target_crs: Crs::Lambert93,
            resolution: 10.0,
            buffer_meters: DEFAULT_BUFFER_METERS,
            hole_area_threshold: DEFAULT_HOLE_AREA_THRESHOLD,
            collection: "sentinel-2-l2a".to_string(),
            catalog_limit: 1000,
            indices: SpectralIndex::ALL.to_vec(),
            id_column: "ID_PARCEL_2022".to_string(),
            geometry_column: "geometry".to_string(),
        }
    }
}

impl PipelineSettings {
    /// Load from a YAML file; missing keys keep their defaults.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let settings: Self = serde_yaml::from_str(&content)
            .map_err(|e| IngestionError::InvalidConfig(format!("{}: {}", path.as_ref().display(), e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Input columns holding the parcel id and boundary.
    pub fn columns(&self) -> ParcelColumns {
        ParcelColumns::new(&self.id_column, &self.geometry_column)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_crs.is_geographic() {
            return Err(IngestionError::InvalidConfig(format!(
                "target CRS must be projected, got {}",
                self.target_crs
            )));
        }
        if !(self.resolution > 0.0) {
            return Err(IngestionError::InvalidConfig(format!(
                "resolution must be positive, got {}",
                self.resolution
            )));
        }
        if self.buffer_meters < 0.0 {
            return Err(IngestionError::InvalidConfig(format!(
                "buffer must be non-negative, got {}",
                self.buffer_meters
            )));
        }
        if self.indices.is_empty() {
            return Err(IngestionError::InvalidConfig("no index configured".to_string()));
        }
        if self.catalog_limit == 0 {
            return Err(IngestionError::InvalidConfig("catalog limit must be at least 1".to_string()));
        }
        Ok(())
    }
}
