//! Normalized-difference index computation.

use ndarray::{Array3, ArrayView3, Zip};

use etl_common::{Crs, SpectralIndex, NODATA};
use raster::RasterStack;

/// One index over every time slice of a stack, time × row × col.
#[derive(Debug, Clone)]
pub struct SpectralIndexArray {
    pub index: SpectralIndex,
    pub data: Array3<f64>,
    pub nodata: f64,
    pub crs: Crs,
}

/// `(left - right) / (left + right)` with cloud masking and range filtering.
///
/// Masked pixels become NaN, values below -1 become [`NODATA`]. Values above
/// 1 are kept. A zero denominator yields NaN or ±inf as IEEE arithmetic does.
pub fn normalized_difference(
    left: ArrayView3<f64>,
    right: ArrayView3<f64>,
    mask: ArrayView3<bool>,
) -> Array3<f64> {
    let mut out = Array3::<f64>::zeros(left.raw_dim());
    Zip::from(&mut out)
        .and(left)
        .and(right)
        .and(mask)
        .for_each(|out, &l, &r, &masked| {
            let value = if masked { f64::NAN } else { (l - r) / (l + r) };
            *out = if value < -1.0 { NODATA } else { value };
        });
    out
}

/// Compute `index` from its band pair in `stack`, sharing `mask`.
pub fn compute_index(stack: &RasterStack, index: SpectralIndex, mask: ArrayView3<bool>) -> SpectralIndexArray {
    let (left, right) = index.bands();
    SpectralIndexArray {
        index,
        data: normalized_difference(stack.band(left), stack.band(right), mask),
        nodata: NODATA,
        crs: stack.grid().crs,
    }
}
