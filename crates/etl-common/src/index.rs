//! Spectral bands and the normalized-difference indices built from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::EtlError;

/// Nodata sentinel stamped on index rasters.
pub const NODATA: f64 = -999.0;

/// Sentinel-2 L2A assets read for every scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Red,
    Nir,
    Swir16,
    Nir08,
    /// Scene classification layer
    Scl,
}

impl Band {
    /// Every band, in stack order.
    pub const ALL: [Band; 5] = [Band::Red, Band::Nir, Band::Swir16, Band::Nir08, Band::Scl];

    /// Asset key in the catalog item.
    pub fn asset_key(&self) -> &'static str {
        match self {
            Band::Red => "red",
            Band::Nir => "nir",
            Band::Swir16 => "swir16",
            Band::Nir08 => "nir08",
            Band::Scl => "scl",
        }
    }

    /// Position of the band along the stack's band axis.
    pub fn stack_index(&self) -> usize {
        match self {
            Band::Red => 0,
            Band::Nir => 1,
            Band::Swir16 => 2,
            Band::Nir08 => 3,
            Band::Scl => 4,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.asset_key())
    }
}

impl FromStr for Band {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Band::ALL
            .into_iter()
            .find(|band| band.asset_key() == s)
            .ok_or_else(|| EtlError::UnknownBand(s.to_string()))
    }
}

/// Normalized-difference indices persisted per parcel and date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectralIndex {
    /// (nir - red) / (nir + red)
    Ndvi,
    /// (nir08 - swir16) / (nir08 + swir16)
    Ndmi,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 2] = [SpectralIndex::Ndvi, SpectralIndex::Ndmi];

    /// (left, right) operands of the normalized difference.
    pub fn bands(&self) -> (Band, Band) {
        match self {
            SpectralIndex::Ndvi => (Band::Nir, Band::Red),
            SpectralIndex::Ndmi => (Band::Nir08, Band::Swir16),
        }
    }

    /// Name stored in the `product_name` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "ndvi",
            SpectralIndex::Ndmi => "ndmi",
        }
    }
}

impl fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpectralIndex {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ndvi" => Ok(SpectralIndex::Ndvi),
            "ndmi" => Ok(SpectralIndex::Ndmi),
            _ => Err(EtlError::UnknownIndex(s.to_string())),
        }
    }
}
