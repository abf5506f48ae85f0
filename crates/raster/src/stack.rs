//! Eager band × time × row × column materialization.

use chrono::{DateTime, Utc};
use ndarray::{s, Array4, ArrayView3, Axis};
use tracing::{debug, info};

use etl_common::{Band, Crs};
use scene_catalog::Scene;

use crate::error::{RasterError, Result};
use crate::grid::TargetGrid;
use crate::reader::AssetReader;

/// All bands of all selected scenes on one grid.
///
/// Raw zero samples have already been turned into NaN and scale/offset
/// applied.
#[derive(Debug, Clone)]
pub struct RasterStack {
    data: Array4<f64>,
    times: Vec<Option<DateTime<Utc>>>,
    grid: TargetGrid,
}

impl RasterStack {
    /// `data` is indexed (band, time, row, col), bands in [`Band::ALL`] order.
    pub fn new(data: Array4<f64>, times: Vec<Option<DateTime<Utc>>>, grid: TargetGrid) -> Result<Self> {
        let (rows, cols) = grid.shape();
        let expected = [Band::ALL.len(), times.len(), rows, cols];
        if data.shape() != expected {
            return Err(RasterError::InvalidGrid(format!(
                "stack shape {:?} does not match {:?}",
                data.shape(),
                expected
            )));
        }
        Ok(Self { data, times, grid })
    }

    /// time × row × col view of one band.
    pub fn band(&self, band: Band) -> ArrayView3<'_, f64> {
        self.data.index_axis(Axis(0), band.stack_index())
    }

    pub fn times(&self) -> &[Option<DateTime<Utc>>] {
        &self.times
    }

    pub fn grid(&self) -> &TargetGrid {
        &self.grid
    }

    /// Number of time slices.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Builds a [`RasterStack`] from selected scenes through an [`AssetReader`].
pub struct RasterStackBuilder<'a, R: ?Sized> {
    reader: &'a R,
}

impl<'a, R: AssetReader + ?Sized> RasterStackBuilder<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self { reader }
    }

    /// Read every band of every scene onto `grid`.
    ///
    /// Returns `None` when there are no scenes. A scene missing one of the
    /// bands is an error.
    pub async fn build(&self, scenes: &[Scene], grid: &TargetGrid) -> Result<Option<RasterStack>> {
        if scenes.is_empty() {
            return Ok(None);
        }

        let (rows, cols) = grid.shape();
        info!(
            scenes = scenes.len(),
            bands = Band::ALL.len(),
            rows = rows,
            cols = cols,
            "Building raster stack"
        );

        let mut data = Array4::from_elem((Band::ALL.len(), scenes.len(), rows, cols), f64::NAN);
        let mut times = Vec::with_capacity(scenes.len());

        for (t, scene) in scenes.iter().enumerate() {
            let native_crs = scene.epsg.and_then(|code| Crs::from_epsg(code).ok());

            for band in Band::ALL {
                let asset = scene.asset(band).ok_or_else(|| RasterError::MissingAsset {
                    scene: scene.id.clone(),
                    band: band.to_string(),
                })?;

                let raw = self.reader.read(asset, native_crs, grid).await?;
                if raw.dim() != (rows, cols) {
                    return Err(RasterError::InvalidGrid(format!(
                        "{} {} read as {:?}, expected {:?}",
                        scene.id,
                        band,
                        raw.dim(),
                        (rows, cols)
                    )));
                }

                let mut slot = data.slice_mut(s![band.stack_index(), t, .., ..]);
                slot.zip_mut_with(&raw, |out, &v| {
                    *out = if v == 0.0 { f64::NAN } else { asset.rescale(v) };
                });
                debug!(scene = %scene.id, band = %band, "Band read");
            }

            times.push(Some(scene.datetime));
        }

        RasterStack::new(data, times, grid.clone()).map(Some)
    }
}
