//! Reading one band of one scene onto the target grid.

use async_trait::async_trait;
use ndarray::Array2;
use std::time::Duration;
use tracing::{debug, instrument};

use etl_common::Crs;
use scene_catalog::AssetRef;

use crate::cog::{CogReader, HttpRangeSource};
use crate::error::{RasterError, Result};
use crate::grid::TargetGrid;

/// Fetches a band asset resampled onto a target grid.
///
/// Returns raw sample values with shape `grid.shape()`; cells outside the
/// source raster are NaN. Scale and offset are not applied here.
#[async_trait]
pub trait AssetReader: Send + Sync {
    /// `native_crs` is the CRS advertised by the catalog, used when the file
    /// itself does not declare one.
    async fn read(&self, asset: &AssetRef, native_crs: Option<Crs>, grid: &TargetGrid) -> Result<Array2<f64>>;
}

/// Reads Cloud-Optimized GeoTIFF assets over HTTP range requests.
pub struct CogAssetReader {
    client: reqwest::Client,
    max_retries: u32,
    initial_backoff: Duration,
}

impl CogAssetReader {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        })
    }

    pub fn with_retries(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }
}

#[async_trait]
impl AssetReader for CogAssetReader {
    #[instrument(skip(self, asset, grid), fields(href = %asset.href))]
    async fn read(&self, asset: &AssetRef, native_crs: Option<Crs>, grid: &TargetGrid) -> Result<Array2<f64>> {
        let source = HttpRangeSource::new(self.client.clone(), asset.href.clone())
            .with_retries(self.max_retries, self.initial_backoff);
        let cog = CogReader::open(source).await?;

        let crs = match cog.epsg() {
            Some(code) => Crs::from_epsg(code)?,
            None => native_crs.ok_or_else(|| RasterError::MissingCrs(asset.href.clone()))?,
        };
        debug!(crs = %crs, "Sampling asset onto target grid");

        cog.sample_onto(grid, crs).await
    }
}
