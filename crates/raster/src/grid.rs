//! Geotransforms and the common target grid.

use etl_common::{BoundingBox, Crs};
use projection::CrsTransform;

use crate::error::{RasterError, Result};

/// Points sampled per edge when projecting a lon/lat box.
const DENSIFY_POINTS: usize = 21;

/// North-up affine transform between pixel and map coordinates.
///
/// `origin_x`/`origin_y` is the outer corner of the top-left pixel;
/// `pixel_height` is negative for north-up rasters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub origin_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            origin_y,
            pixel_height,
        }
    }

    /// From GDAL's six-coefficient form. Rotation terms are ignored.
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self::new(gt[0], gt[3], gt[1], gt[5])
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [self.origin_x, self.pixel_width, 0.0, self.origin_y, 0.0, self.pixel_height]
    }

    /// Map coordinates of a pixel centre.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional (col, row) of a map coordinate.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (y - self.origin_y) / self.pixel_height,
        )
    }
}

/// The grid every band of every scene is resampled onto.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGrid {
    pub crs: Crs,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

impl TargetGrid {
    pub fn new(crs: Crs, transform: GeoTransform, width: usize, height: usize) -> Self {
        Self {
            crs,
            transform,
            width,
            height,
        }
    }

    /// Grid covering a lon/lat box, projected to `crs` and snapped outward to
    /// multiples of `resolution`.
    pub fn from_geographic_bounds(bounds: &BoundingBox, crs: Crs, resolution: f64) -> Result<Self> {
        if !(resolution > 0.0) {
            return Err(RasterError::InvalidGrid(format!(
                "resolution must be positive, got {}",
                resolution
            )));
        }

        let projected = CrsTransform::new(Crs::Wgs84, crs).transform_bbox(bounds, DENSIFY_POINTS);
        Self::from_projected_bounds(&projected, crs, resolution)
    }

    /// Grid covering a box already expressed in `crs`.
    pub fn from_projected_bounds(bounds: &BoundingBox, crs: Crs, resolution: f64) -> Result<Self> {
        let min_x = (bounds.min_x / resolution).floor() * resolution;
        let min_y = (bounds.min_y / resolution).floor() * resolution;
        let max_x = (bounds.max_x / resolution).ceil() * resolution;
        let max_y = (bounds.max_y / resolution).ceil() * resolution;

        let width = ((max_x - min_x) / resolution).round();
        let height = ((max_y - min_y) / resolution).round();

        if !width.is_finite() || !height.is_finite() || width < 1.0 || height < 1.0 {
            return Err(RasterError::InvalidGrid(format!(
                "degenerate bounds {:?}",
                bounds
            )));
        }

        Ok(Self {
            crs,
            transform: GeoTransform::new(min_x, max_y, resolution, -resolution),
            width: width as usize,
            height: height as usize,
        })
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn resolution(&self) -> f64 {
        self.transform.pixel_width
    }

    pub fn bounds(&self) -> BoundingBox {
        let t = &self.transform;
        BoundingBox::new(
            t.origin_x,
            t.origin_y + self.height as f64 * t.pixel_height,
            t.origin_x + self.width as f64 * t.pixel_width,
            t.origin_y,
        )
    }
}
