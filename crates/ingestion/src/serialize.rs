//! Per-date index slices to storable rows.

use chrono::{DateTime, Utc};
use ndarray::{ArrayView2, Axis};
use tracing::debug;

use raster::{encode_geotiff, TargetGrid};
use storage::RasterRow;

use crate::error::Result;
use crate::index::SpectralIndexArray;

/// Encode every non-empty time slice of `array` as one row.
///
/// Slices without a timestamp and slices holding only NaN or nodata are
/// skipped. `times` runs parallel to the array's time axis.
pub fn serialize_index(
    parcel_id: &str,
    array: &SpectralIndexArray,
    times: &[Option<DateTime<Utc>>],
    grid: &TargetGrid,
) -> Result<Vec<RasterRow>> {
    let mut rows = Vec::new();

    for (slice, time) in array.data.axis_iter(Axis(0)).zip(times) {
        let Some(time) = time else {
            debug!(parcel = %parcel_id, index = %array.index, "Skipping slice without timestamp");
            continue;
        };
        if is_empty_slice(slice, array.nodata) {
            debug!(parcel = %parcel_id, index = %array.index, date = %time.date_naive(), "Skipping empty slice");
            continue;
        }

        let blob = encode_geotiff(slice, grid, array.nodata)?;
        rows.push(RasterRow::new(parcel_id, array.index, time.date_naive(), blob));
    }

    Ok(rows)
}

fn is_empty_slice(slice: ArrayView2<f64>, nodata: f64) -> bool {
    slice.iter().all(|&v| v.is_nan() || v == nodata)
}
