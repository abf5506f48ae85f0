//! Common test fixtures for spectral ETL tests.
//!
//! Parcels sit next to the Lambert-93 false origin (3°E, 46.5°N), so their
//! lon/lat footprint is easy to reason about.

use chrono::{TimeZone, Utc};
use geo::{polygon, MultiPolygon};
use std::collections::BTreeMap;
use std::io::Write;
use tempfile::NamedTempFile;

use etl_common::Band;
use scene_catalog::{AssetRef, Scene};

/// Surface reflectance scale advertised by Earth Search.
pub const REFLECTANCE_SCALE: f64 = 0.0001;

/// 100 m square parcel in Lambert-93.
pub const PARCEL_WKT: &str =
    "POLYGON((700000 6600000,700100 6600000,700100 6600100,700000 6600100,700000 6600000))";

/// 200 m square parcel with a 500 m² and a 1500 m² hole.
pub const HOLED_PARCEL_WKT: &str = "POLYGON((700000 6600000,700200 6600000,700200 6600200,700000 6600200,700000 6600000),\
     (700010 6600010,700020 6600010,700020 6600060,700010 6600060,700010 6600010),\
     (700100 6600100,700130 6600100,700130 6600150,700100 6600150,700100 6600100))";

/// Axis-aligned lon/lat footprint.
pub fn footprint(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: min_lon, y: min_lat),
        (x: max_lon, y: min_lat),
        (x: max_lon, y: max_lat),
        (x: min_lon, y: max_lat),
        (x: min_lon, y: min_lat),
    ]])
}

/// Footprint containing every fixture parcel.
pub fn covering_footprint() -> MultiPolygon<f64> {
    footprint(2.5, 46.0, 3.5, 47.0)
}

/// Footprint that only clips the fixture parcels' western edge.
pub fn clipping_footprint() -> MultiPolygon<f64> {
    footprint(2.5, 46.0, 3.0005, 47.0)
}

/// Footprint far from every fixture parcel.
pub fn disjoint_footprint() -> MultiPolygon<f64> {
    footprint(5.0, 48.0, 6.0, 49.0)
}

/// Href of a fake scene asset, understood by [`crate::FakeAssetReader`].
pub fn asset_href(scene_id: &str, band: Band) -> String {
    format!("fake://{}/{}", scene_id, band.asset_key())
}

/// Scene with every band, acquired at 10:30 UTC on the given day.
///
/// Reflectance bands carry [`REFLECTANCE_SCALE`]; SCL is unscaled.
pub fn scene(id: &str, ymd: (i32, u32, u32), footprint: MultiPolygon<f64>, cloud_cover: f64) -> Scene {
    let (year, month, day) = ymd;
    let assets: BTreeMap<Band, AssetRef> = Band::ALL
        .into_iter()
        .map(|band| {
            let mut asset = AssetRef::new(asset_href(id, band));
            if band != Band::Scl {
                asset.scale = Some(REFLECTANCE_SCALE);
                asset.offset = Some(0.0);
            }
            (band, asset)
        })
        .collect();

    Scene {
        id: id.to_string(),
        datetime: Utc
            .with_ymd_and_hms(year, month, day, 10, 30, 0)
            .single()
            .unwrap_or_else(|| panic!("invalid fixture date {:?}", ymd)),
        footprint,
        cloud_cover,
        epsg: Some(32631),
        assets,
    }
}

/// Write a parcel CSV with the default column names.
pub fn parcels_csv(parcels: &[(&str, &str)]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp csv");
    writeln!(file, "ID_PARCEL_2022,geometry").expect("write csv header");
    for (id, wkt) in parcels {
        writeln!(file, "{},\"{}\"", id, wkt).expect("write csv row");
    }
    file.flush().expect("flush csv");
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Contains;

    #[test]
    fn test_scene_has_all_bands() {
        let s = scene("S2A_1", (2023, 6, 10), covering_footprint(), 12.0);
        assert_eq!(s.assets.len(), Band::ALL.len());
        assert_eq!(s.asset(Band::Scl).unwrap().scale, None);
        assert_eq!(s.asset(Band::Nir).unwrap().href, "fake://S2A_1/nir");
        assert_eq!(s.date().to_string(), "2023-06-10");
    }

    #[test]
    fn test_footprints() {
        let parcel = footprint(3.0, 46.5, 3.0013, 46.5009);
        assert!(covering_footprint().contains(&parcel));
        assert!(!clipping_footprint().contains(&parcel));
        assert!(!disjoint_footprint().contains(&parcel));
    }

    #[test]
    fn test_parcels_csv() {
        let file = parcels_csv(&[("p1", PARCEL_WKT)]);
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.starts_with("ID_PARCEL_2022,geometry\np1,\"POLYGON"));
    }
}
