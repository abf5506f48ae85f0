//! Parcel boundary cleaning, reprojection and search window computation.

use geo::{Area, BoundingRect, Centroid, Coord, Geometry, LineString, MapCoords, MultiPolygon, Polygon};
use tracing::debug;
use wkt::{ToWkt, TryFromWkt};

use etl_common::{BoundingBox, Crs};
use projection::CrsTransform;

use crate::config::PipelineSettings;
use crate::error::GeometryError;

/// Length of one degree of latitude, meters.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// A parcel ready for scene search and stack building.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedParcel {
    pub id: String,
    /// Cleaned boundary in the source projected CRS
    pub boundary: MultiPolygon<f64>,
    /// `boundary` in lon/lat
    pub search_boundary: MultiPolygon<f64>,
    /// Buffered lon/lat window used for the stack
    pub search_bounds: BoundingBox,
}

impl PreparedParcel {
    /// Source-CRS boundary as WKT, the form stored with the parcel.
    pub fn boundary_wkt(&self) -> String {
        self.boundary.wkt_string()
    }
}

/// Turns raw parcel rows into [`PreparedParcel`]s.
#[derive(Debug, Clone)]
pub struct GeometryPreparer {
    to_search: CrsTransform,
    hole_area_threshold: f64,
    buffer_meters: f64,
}

impl GeometryPreparer {
    pub fn new(source_crs: Crs, hole_area_threshold: f64, buffer_meters: f64) -> Self {
        Self {
            to_search: CrsTransform::new(source_crs, Crs::Wgs84),
            hole_area_threshold,
            buffer_meters,
        }
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(
            settings.target_crs,
            settings.hole_area_threshold,
            settings.buffer_meters,
        )
    }

    pub fn prepare(&self, id: &str, boundary_wkt: &str) -> Result<PreparedParcel, GeometryError> {
        let polygon = parse_polygon(boundary_wkt)?;
        let boundary = remove_polygon_holes(&polygon, self.hole_area_threshold);
        let search_boundary = reproject(&boundary, &self.to_search);
        let search_bounds = buffered_bounds(&search_boundary, self.buffer_meters)?;

        debug!(
            parcel = %id,
            holes_before = polygon.interiors().len(),
            holes_after = boundary.0.iter().map(|p| p.interiors().len()).sum::<usize>(),
            "Prepared parcel geometry"
        );

        Ok(PreparedParcel {
            id: id.to_string(),
            boundary,
            search_boundary,
            search_bounds,
        })
    }
}

/// Parse a `POLYGON` or single-member `MULTIPOLYGON`.
pub fn parse_polygon(text: &str) -> Result<Polygon<f64>, GeometryError> {
    let geometry =
        Geometry::<f64>::try_from_wkt_str(text).map_err(|e| GeometryError::Parse(e.to_string()))?;

    let polygon = match geometry {
        Geometry::Polygon(polygon) => polygon,
        Geometry::MultiPolygon(MultiPolygon(mut polygons)) if polygons.len() == 1 => polygons.swap_remove(0),
        Geometry::MultiPolygon(polygons) => {
            return Err(GeometryError::NotPolygon(format!(
                "MultiPolygon with {} members",
                polygons.0.len()
            )))
        }
        other => return Err(GeometryError::NotPolygon(geometry_kind(&other).to_string())),
    };

    if polygon.exterior().0.len() < 4 || polygon.unsigned_area() == 0.0 {
        return Err(GeometryError::Degenerate("exterior ring encloses no area".to_string()));
    }
    Ok(polygon)
}

/// Drop interior rings whose area does not exceed `threshold`.
pub fn remove_polygon_holes(polygon: &Polygon<f64>, threshold: f64) -> MultiPolygon<f64> {
    let kept: Vec<LineString<f64>> = polygon
        .interiors()
        .iter()
        .filter(|ring| ring_area(ring) > threshold)
        .cloned()
        .collect();

    MultiPolygon::new(vec![Polygon::new(polygon.exterior().clone(), kept)])
}

/// Transform every vertex, (x, y) / (lon, lat) order.
pub fn reproject(geometry: &MultiPolygon<f64>, transform: &CrsTransform) -> MultiPolygon<f64> {
    geometry.map_coords(|Coord { x, y }| {
        let (x, y) = transform.transform(x, y);
        Coord { x, y }
    })
}

/// Meters to decimal degrees at `latitude`, 111.32 km per degree scaled by
/// the cosine of the latitude.
pub fn meters_to_decimal_degrees(meters: f64, latitude: f64) -> Result<f64, GeometryError> {
    if !(meters >= 0.0) {
        return Err(GeometryError::NegativeDistance(meters));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(GeometryError::LatitudeOutOfRange(latitude));
    }
    Ok(meters / (METERS_PER_DEGREE * latitude.to_radians().cos()))
}

/// Bounding box of `search_boundary` buffered by `meters`.
///
/// The reference latitude is the boundary centroid's.
pub fn buffered_bounds(search_boundary: &MultiPolygon<f64>, meters: f64) -> Result<BoundingBox, GeometryError> {
    let centroid = search_boundary
        .centroid()
        .ok_or_else(|| GeometryError::Degenerate("boundary has no centroid".to_string()))?;
    let rect = search_boundary
        .bounding_rect()
        .ok_or_else(|| GeometryError::Degenerate("boundary has no extent".to_string()))?;

    let degrees = meters_to_decimal_degrees(meters, centroid.y())?;
    Ok(BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y).expand(degrees))
}

fn ring_area(ring: &LineString<f64>) -> f64 {
    Polygon::new(ring.clone(), vec![]).unsigned_area()
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
