//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A geographic or projected bounding box.
///
/// For geographic CRS (EPSG:4326), coordinates are longitude/latitude degrees.
/// For projected CRS (EPSG:2154, UTM zones), coordinates are in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest box enclosing every point, or `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let mut bbox = Self::new(x, y, x, y);
        for (x, y) in iter {
            bbox.include(x, y);
        }
        Some(bbox)
    }

    /// Grow the box so it contains the point.
    pub fn include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Expand outward by `distance` on every side.
    pub fn expand(&self, distance: f64) -> Self {
        Self {
            min_x: self.min_x - distance,
            min_y: self.min_y - distance,
            max_x: self.max_x + distance,
            max_y: self.max_y + distance,
        }
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Points sampled along the four edges, `per_edge` points each (corners included).
    ///
    /// Used when reprojecting a box: curved edges in the target CRS can bulge
    /// past the projected corners.
    pub fn densify(&self, per_edge: usize) -> Vec<(f64, f64)> {
        let steps = per_edge.max(2) - 1;
        let mut points = Vec::with_capacity(steps * 4);
        for i in 0..steps {
            let t = i as f64 / steps as f64;
            let x = self.min_x + t * self.width();
            let y = self.min_y + t * self.height();
            points.push((x, self.min_y));
            points.push((self.max_x, y));
            points.push((self.max_x - t * self.width(), self.max_y));
            points.push((self.min_x, self.max_y - t * self.height()));
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let bbox = BoundingBox::from_points(vec![(1.0, 5.0), (-2.0, 3.0), (4.0, -1.0)]).unwrap();
        assert_eq!(bbox, BoundingBox::new(-2.0, -1.0, 4.0, 5.0));
        assert!(BoundingBox::from_points(Vec::new()).is_none());
    }

    #[test]
    fn test_expand() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0).expand(0.5);
        assert_eq!(bbox.min_x, -0.5);
        assert_eq!(bbox.max_y, 10.5);
        assert_eq!(bbox.width(), 11.0);
    }

    #[test]
    fn test_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_densify_covers_corners() {
        let bbox = BoundingBox::new(0.0, 0.0, 2.0, 1.0);
        let points = bbox.densify(5);
        assert_eq!(points.len(), 16);
        for corner in [(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (0.0, 1.0)] {
            assert!(points.contains(&corner), "missing corner {:?}", corner);
        }
        assert!(points.iter().all(|&(x, y)| bbox.contains_point(x, y)));
    }
}
