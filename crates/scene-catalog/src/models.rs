//! STAC (SpatioTemporal Asset Catalog) data types.
//!
//! Serde models for STAC Item Search (`POST /search`) requests and responses,
//! covering what scene discovery needs: `intersects` geometry, datetime and
//! collection filters, pagination via `links`, and asset access.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Search request
// ---------------------------------------------------------------------------

/// Body for `POST /search` (STAC API – Item Search).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StacSearchParams {
    /// GeoJSON geometry the items must intersect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersects: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// Pagination token (next page).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl StacSearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the GeoJSON geometry filter.
    pub fn intersects(mut self, geometry: serde_json::Value) -> Self {
        self.intersects = Some(geometry);
        self
    }

    /// Set datetime or datetime range (e.g. `"2024-06-01T00:00:00Z/2024-06-30T23:59:59Z"`).
    pub fn datetime(mut self, dt: &str) -> Self {
        self.datetime = Some(dt.to_string());
        self
    }

    pub fn collections(mut self, cols: &[&str]) -> Self {
        self.collections = Some(cols.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Set maximum items per page.
    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A STAC Item Collection (GeoJSON FeatureCollection).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemCollection {
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default)]
    pub features: Vec<StacItem>,

    #[serde(default)]
    pub links: Vec<StacLink>,

    #[serde(rename = "numberMatched", skip_serializing_if = "Option::is_none")]
    pub number_matched: Option<u64>,
}

impl StacItemCollection {
    /// Find the `"next"` pagination link, if any.
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|l| l.rel == "next")
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A single STAC Item (GeoJSON Feature).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItem {
    /// Unique item identifier.
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    pub properties: StacItemProperties,

    #[serde(default)]
    pub assets: HashMap<String, StacAsset>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl StacItem {
    pub fn asset(&self, key: &str) -> Option<&StacAsset> {
        self.assets.get(key)
    }

    /// EPSG code of the item's native grid, from `proj:epsg` or the newer
    /// `proj:code` ("EPSG:32630").
    pub fn epsg(&self) -> Option<u32> {
        let extra = &self.properties.extra;
        if let Some(code) = extra.get("proj:epsg").and_then(|v| v.as_u64()) {
            return Some(code as u32);
        }
        extra
            .get("proj:code")
            .and_then(|v| v.as_str())
            .and_then(|s| s.strip_prefix("EPSG:"))
            .and_then(|s| s.parse().ok())
    }
}

/// STAC Item properties.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemProperties {
    /// ISO 8601 datetime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    /// Cloud cover percentage (EO extension).
    #[serde(rename = "eo:cloud_cover", skip_serializing_if = "Option::is_none")]
    pub eo_cloud_cover: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// All other properties we don't model explicitly.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A single STAC Asset (file reference).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacAsset {
    pub href: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// Raster extension band descriptions (scale/offset/nodata).
    #[serde(rename = "raster:bands", default, skip_serializing_if = "Vec::is_empty")]
    pub raster_bands: Vec<RasterBand>,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// One entry of the `raster:bands` asset field.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RasterBand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodata: Option<f64>,
}

/// A STAC Link (used for pagination).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacLink {
    /// Relationship: `"self"`, `"root"`, `"next"`, `"prev"`, etc.
    pub rel: String,

    pub href: String,

    /// HTTP method for the link (default GET, but `"next"` often uses POST).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Request body for POST-based pagination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,

    /// If true, merge body with previous request body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_serialization() {
        let params = StacSearchParams::new()
            .intersects(serde_json::json!({"type": "Point", "coordinates": [0.0, 0.0]}))
            .datetime("2023-06-01T00:00:00Z/2023-06-30T23:59:59Z")
            .collections(&["sentinel-2-l2a"])
            .limit(1000);

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["collections"][0], "sentinel-2-l2a");
        assert_eq!(json["limit"], 1000);
        assert_eq!(json["intersects"]["type"], "Point");
        assert!(json.get("token").is_none());
        assert!(json.get("bbox").is_none());
    }

    #[test]
    fn test_item_epsg_from_proj_code() {
        let item: StacItem = serde_json::from_value(serde_json::json!({
            "id": "S2B_30TXS_20230610_0_L2A",
            "properties": {"datetime": "2023-06-10T11:07:12Z", "proj:code": "EPSG:32630"},
            "assets": {}
        }))
        .unwrap();
        assert_eq!(item.epsg(), Some(32630));
    }

    #[test]
    fn test_asset_raster_bands() {
        let asset: StacAsset = serde_json::from_value(serde_json::json!({
            "href": "https://example.com/B04.tif",
            "raster:bands": [{"nodata": 0, "scale": 0.0001, "offset": -0.1}]
        }))
        .unwrap();
        assert_eq!(asset.raster_bands[0].scale, Some(0.0001));
        assert_eq!(asset.raster_bands[0].offset, Some(-0.1));
    }

    #[test]
    fn test_next_link() {
        let page: StacItemCollection = serde_json::from_value(serde_json::json!({
            "type": "FeatureCollection",
            "features": [],
            "links": [
                {"rel": "self", "href": "https://example.com/search"},
                {"rel": "next", "href": "https://example.com/search", "method": "POST", "body": {"next": "abc"}}
            ]
        }))
        .unwrap();
        let next = page.next_link().unwrap();
        assert_eq!(next.method.as_deref(), Some("POST"));
        assert!(page.is_empty());
    }
}
