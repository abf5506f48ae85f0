//! Coordinate reference system transformations.
//!
//! Implements the handful of map projections the pipeline needs from scratch
//! without external dependencies: Lambert-93 for parcels and products, UTM
//! for Sentinel-2 tiles, and plain lon/lat for catalog searches.

pub mod ellipsoid;
pub mod lambert;
pub mod transform;
pub mod utm;

pub use ellipsoid::Ellipsoid;
pub use lambert::LambertConformal;
pub use transform::{CrsTransform, Projection};
pub use utm::TransverseMercator;
