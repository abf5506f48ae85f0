//! Coordinate Reference System types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate reference systems the pipeline works in.
///
/// Parcels arrive and are stored in Lambert-93, the catalog is searched in
/// WGS84, and Sentinel-2 assets are delivered on UTM grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// RGF93 / Lambert-93 (EPSG:2154), meters
    Lambert93,
    /// WGS84 Geographic (EPSG:4326), longitude/latitude degrees
    Wgs84,
    /// WGS84 / UTM zone (EPSG:326zz north, 327zz south), meters
    Utm { zone: u8, north: bool },
}

impl Crs {
    /// Resolve a numeric EPSG code.
    pub fn from_epsg(code: u32) -> Result<Self, CrsParseError> {
        match code {
            2154 => Ok(Crs::Lambert93),
            4326 => Ok(Crs::Wgs84),
            32601..=32660 => Ok(Crs::Utm {
                zone: (code - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Ok(Crs::Utm {
                zone: (code - 32700) as u8,
                north: false,
            }),
            _ => Err(CrsParseError::UnsupportedCrs(code.to_string())),
        }
    }

    /// Parse "EPSG:2154", "epsg:4326" or a bare code.
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();
        let digits = normalized.strip_prefix("EPSG:").unwrap_or(&normalized);
        let code = digits
            .parse::<u32>()
            .map_err(|_| CrsParseError::UnsupportedCrs(s.to_string()))?;
        Self::from_epsg(code)
    }

    /// Numeric EPSG code.
    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Lambert93 => 2154,
            Crs::Wgs84 => 4326,
            Crs::Utm { zone, north: true } => 32600 + *zone as u32,
            Crs::Utm { zone, north: false } => 32700 + *zone as u32,
        }
    }

    /// Check if this is a geographic (lon/lat) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Wgs84)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!(Crs::parse("EPSG:2154").unwrap(), Crs::Lambert93);
        assert_eq!(Crs::parse("epsg:4326").unwrap(), Crs::Wgs84);
        assert_eq!(
            Crs::parse("32631").unwrap(),
            Crs::Utm {
                zone: 31,
                north: true
            }
        );
        assert!(Crs::parse("EPSG:3857").is_err());
        assert!(Crs::parse("lambert").is_err());
    }

    #[test]
    fn test_epsg_roundtrip() {
        for code in [2154, 4326, 32630, 32631, 32732] {
            assert_eq!(Crs::from_epsg(code).unwrap().epsg(), code);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Crs::Lambert93.to_string(), "EPSG:2154");
        assert_eq!(
            Crs::Utm {
                zone: 30,
                north: true
            }
            .to_string(),
            "EPSG:32630"
        );
    }
}
