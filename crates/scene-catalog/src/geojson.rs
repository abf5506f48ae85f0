//! Minimal GeoJSON geometry (de)serialization for search bodies and footprints.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Polygonal GeoJSON geometry. Positions keep any extra ordinates the
/// provider sends; only x and y are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
}

impl GeoJsonGeometry {
    /// Encode a multi-polygon. A single-member multi-polygon is written as a
    /// plain `Polygon`.
    pub fn from_multi_polygon(geometry: &MultiPolygon<f64>) -> Self {
        if geometry.0.len() == 1 {
            return GeoJsonGeometry::Polygon {
                coordinates: polygon_to_positions(&geometry.0[0]),
            };
        }
        GeoJsonGeometry::MultiPolygon {
            coordinates: geometry.0.iter().map(polygon_to_positions).collect(),
        }
    }

    pub fn to_multi_polygon(&self) -> Result<MultiPolygon<f64>> {
        match self {
            GeoJsonGeometry::Polygon { coordinates } => {
                Ok(MultiPolygon::new(vec![polygon_from_positions(coordinates)?]))
            }
            GeoJsonGeometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .map(|p| polygon_from_positions(p))
                .collect::<Result<Vec<_>>>()
                .map(MultiPolygon::new),
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| CatalogError::Geometry(e.to_string()))
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|e| CatalogError::Geometry(e.to_string()))
    }
}

fn polygon_to_positions(polygon: &Polygon<f64>) -> Vec<Vec<Vec<f64>>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring.coords().map(|c| vec![c.x, c.y]).collect())
        .collect()
}

fn polygon_from_positions(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|r| ring_from_positions(r));
    let exterior = rings
        .next()
        .ok_or_else(|| CatalogError::Geometry("polygon without exterior ring".into()))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn ring_from_positions(positions: &[Vec<f64>]) -> Result<LineString<f64>> {
    positions
        .iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(CatalogError::Geometry(format!(
                "position needs at least 2 ordinates, got {}",
                p.len()
            ))),
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}
