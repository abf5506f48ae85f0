//! Catalog items reduced to what scene selection and band reading need.

use chrono::{DateTime, NaiveDate, Utc};
use geo::MultiPolygon;
use std::collections::BTreeMap;

use etl_common::Band;

use crate::error::{CatalogError, Result};
use crate::geojson::GeoJsonGeometry;
use crate::models::StacItem;

/// Where to read one band of a scene, and how to turn raw DNs into
/// reflectance.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRef {
    pub href: String,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
}

impl AssetRef {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            scale: None,
            offset: None,
        }
    }

    /// Apply scale and offset to a raw value.
    pub fn rescale(&self, raw: f64) -> f64 {
        raw * self.scale.unwrap_or(1.0) + self.offset.unwrap_or(0.0)
    }
}

/// One acquisition returned by the catalog.
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub datetime: DateTime<Utc>,
    /// Footprint in lon/lat (EPSG:4326)
    pub footprint: MultiPolygon<f64>,
    /// Cloud cover percentage
    pub cloud_cover: f64,
    /// EPSG code of the scene's native grid, if advertised
    pub epsg: Option<u32>,
    pub assets: BTreeMap<Band, AssetRef>,
}

impl Scene {
    /// Calendar date of acquisition (time of day ignored).
    pub fn date(&self) -> NaiveDate {
        self.datetime.date_naive()
    }

    pub fn asset(&self, band: Band) -> Option<&AssetRef> {
        self.assets.get(&band)
    }
}

impl TryFrom<&StacItem> for Scene {
    type Error = CatalogError;

    fn try_from(item: &StacItem) -> Result<Self> {
        let invalid = |reason: &str| CatalogError::InvalidScene {
            id: item.id.clone(),
            reason: reason.to_string(),
        };

        let datetime = item
            .properties
            .datetime
            .as_deref()
            .ok_or_else(|| invalid("missing datetime"))?;
        let datetime = DateTime::parse_from_rfc3339(datetime)
            .map_err(|e| invalid(&format!("bad datetime '{}': {}", datetime, e)))?
            .with_timezone(&Utc);

        let geometry = item.geometry.as_ref().ok_or_else(|| invalid("missing geometry"))?;
        let footprint = GeoJsonGeometry::from_value(geometry)
            .and_then(|g| g.to_multi_polygon())
            .map_err(|e| invalid(&e.to_string()))?;

        let cloud_cover = item
            .properties
            .eo_cloud_cover
            .ok_or_else(|| invalid("missing eo:cloud_cover"))?;

        let assets = Band::ALL
            .into_iter()
            .filter_map(|band| {
                let asset = item.asset(band.asset_key())?;
                let raster_band = asset.raster_bands.first();
                Some((
                    band,
                    AssetRef {
                        href: asset.href.clone(),
                        scale: raster_band.and_then(|b| b.scale),
                        offset: raster_band.and_then(|b| b.offset),
                    },
                ))
            })
            .collect();

        Ok(Scene {
            id: item.id.clone(),
            datetime,
            footprint,
            cloud_cover,
            epsg: item.epsg(),
            assets,
        })
    }
}
