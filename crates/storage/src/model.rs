//! Rows written by the pipeline.

use chrono::NaiveDate;

use etl_common::SpectralIndex;

/// One encoded index raster for a parcel and acquisition date.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterRow {
    pub parcel_id: String,
    pub index: SpectralIndex,
    pub product_date: NaiveDate,
    /// GeoTIFF blob
    pub raster: Vec<u8>,
}

impl RasterRow {
    pub fn new(parcel_id: impl Into<String>, index: SpectralIndex, product_date: NaiveDate, raster: Vec<u8>) -> Self {
        Self {
            parcel_id: parcel_id.into(),
            index,
            product_date,
            raster,
        }
    }
}
