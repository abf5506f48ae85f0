//! Per-pixel usability mask from the scene classification layer.

use ndarray::{Array3, ArrayView3};

/// SCL classes treated as unusable: saturated/defective, cloud shadow,
/// unclassified, cloud medium and high probability, snow/ice.
pub const MASKED_SCL_CLASSES: [u8; 6] = [1, 3, 7, 8, 9, 11];

/// True where a classification value falls in [`MASKED_SCL_CLASSES`].
///
/// NaN classification pixels are not masked.
pub fn cloud_mask(scl: ArrayView3<f64>) -> Array3<bool> {
    scl.mapv(is_masked)
}

fn is_masked(class: f64) -> bool {
    if !class.is_finite() {
        return false;
    }
    MASKED_SCL_CLASSES.iter().any(|&c| class == f64::from(c))
}
