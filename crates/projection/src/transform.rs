//! Point and box transforms between the supported CRSs.
//!
//! Every transform pivots through geographic lon/lat, so a
//! Lambert-93 → UTM conversion is an inverse Lambert followed by a forward
//! Transverse Mercator.

use etl_common::{BoundingBox, Crs};

use crate::{LambertConformal, TransverseMercator};

/// A concrete projection for one CRS.
#[derive(Debug, Clone)]
pub enum Projection {
    Geographic,
    Lambert(LambertConformal),
    TransverseMercator(TransverseMercator),
}

impl Projection {
    pub fn for_crs(crs: Crs) -> Self {
        match crs {
            Crs::Wgs84 => Projection::Geographic,
            Crs::Lambert93 => Projection::Lambert(LambertConformal::lambert93()),
            Crs::Utm { zone, north } => {
                Projection::TransverseMercator(TransverseMercator::utm(zone, north))
            }
        }
    }

    /// (lon, lat) degrees to native (x, y).
    pub fn from_geographic(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (lon, lat),
            Projection::Lambert(p) => p.project(lon, lat),
            Projection::TransverseMercator(p) => p.project(lon, lat),
        }
    }

    /// Native (x, y) to (lon, lat) degrees.
    pub fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (x, y),
            Projection::Lambert(p) => p.unproject(x, y),
            Projection::TransverseMercator(p) => p.unproject(x, y),
        }
    }
}

/// Reusable transform from one CRS to another.
#[derive(Debug, Clone)]
pub struct CrsTransform {
    source_crs: Crs,
    target_crs: Crs,
    source: Projection,
    target: Projection,
}

impl CrsTransform {
    pub fn new(source_crs: Crs, target_crs: Crs) -> Self {
        Self {
            source_crs,
            target_crs,
            source: Projection::for_crs(source_crs),
            target: Projection::for_crs(target_crs),
        }
    }

    pub fn source_crs(&self) -> Crs {
        self.source_crs
    }

    pub fn target_crs(&self) -> Crs {
        self.target_crs
    }

    pub fn is_identity(&self) -> bool {
        self.source_crs == self.target_crs
    }

    /// Transform one coordinate pair, (x, y) / (lon, lat) order.
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        if self.is_identity() {
            return (x, y);
        }
        let (lon, lat) = self.source.to_geographic(x, y);
        self.target.from_geographic(lon, lat)
    }

    /// Transform a box by densifying its edges and taking the envelope of
    /// the transformed points.
    pub fn transform_bbox(&self, bbox: &BoundingBox, per_edge: usize) -> BoundingBox {
        if self.is_identity() {
            return *bbox;
        }
        let points = bbox
            .densify(per_edge)
            .into_iter()
            .map(|(x, y)| self.transform(x, y));
        // densify always yields at least the four corners
        BoundingBox::from_points(points).unwrap_or(*bbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let t = CrsTransform::new(Crs::Lambert93, Crs::Lambert93);
        assert_eq!(t.transform(700123.0, 6600456.0), (700123.0, 6600456.0));
    }

    #[test]
    fn test_lambert_to_wgs84_origin() {
        let t = CrsTransform::new(Crs::Lambert93, Crs::Wgs84);
        let (lon, lat) = t.transform(700000.0, 6600000.0);
        assert!((lon - 3.0).abs() < 1e-9);
        assert!((lat - 46.5).abs() < 1e-9);
    }

    #[test]
    fn test_lambert_to_utm_roundtrip() {
        let utm = Crs::Utm {
            zone: 30,
            north: true,
        };
        let forward = CrsTransform::new(Crs::Lambert93, utm);
        let backward = CrsTransform::new(utm, Crs::Lambert93);

        let (e, n) = forward.transform(380000.0, 6570000.0);
        let (x, y) = backward.transform(e, n);
        assert!((x - 380000.0).abs() < 0.01, "x: {}", x);
        assert!((y - 6570000.0).abs() < 0.01, "y: {}", y);
    }

    #[test]
    fn test_transform_bbox_contains_projected_corners() {
        let t = CrsTransform::new(Crs::Wgs84, Crs::Lambert93);
        let geo = BoundingBox::new(-1.2, 46.1, -1.1, 46.2);
        let projected = t.transform_bbox(&geo, 21);

        for (lon, lat) in [(-1.2, 46.1), (-1.1, 46.1), (-1.1, 46.2), (-1.2, 46.2)] {
            let (x, y) = t.transform(lon, lat);
            assert!(projected.contains_point(x, y));
        }
        // ~0.1° of longitude at 46°N is about 7.7 km
        assert!(projected.width() > 7000.0 && projected.width() < 8500.0);
    }
}
