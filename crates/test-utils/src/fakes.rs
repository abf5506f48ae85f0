//! In-process stand-ins for the catalog and the imagery reader.

use async_trait::async_trait;
use geo::MultiPolygon;
use ndarray::Array2;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use etl_common::{Band, Crs, DateRange};
use raster::{AssetReader, RasterError, TargetGrid};
use scene_catalog::{AssetRef, CatalogError, Scene, SceneCatalog};

/// Catalog returning a fixed scene list, or a fixed failure.
#[derive(Default)]
pub struct FakeCatalog {
    scenes: Vec<Scene>,
    failure: Option<u16>,
    searches: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self {
            scenes,
            ..Default::default()
        }
    }

    /// Every search fails with this HTTP status.
    pub fn failing(status: u16) -> Self {
        Self {
            failure: Some(status),
            ..Default::default()
        }
    }

    /// Number of searches served.
    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SceneCatalog for FakeCatalog {
    async fn search(
        &self,
        _geometry: &MultiPolygon<f64>,
        range: &DateRange,
        _collection: &str,
        limit: usize,
    ) -> scene_catalog::Result<Vec<Scene>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.failure {
            return Err(CatalogError::Status {
                status,
                body: "scripted failure".to_string(),
            });
        }
        Ok(self
            .scenes
            .iter()
            .filter(|s| range.contains(s.date()))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Asset reader filling the whole grid with one raw value per asset.
///
/// Hrefs must come from [`crate::asset_href`]. Values are looked up by exact
/// href first, then by band.
#[derive(Debug, Clone, Default)]
pub struct FakeAssetReader {
    by_band: HashMap<Band, f64>,
    by_href: HashMap<String, f64>,
}

impl FakeAssetReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value of `band` in every scene.
    pub fn band(mut self, band: Band, raw: f64) -> Self {
        self.by_band.insert(band, raw);
        self
    }

    /// Raw value of `band` in one scene.
    pub fn scene_band(mut self, scene_id: &str, band: Band, raw: f64) -> Self {
        self.by_href.insert(crate::asset_href(scene_id, band), raw);
        self
    }
}

#[async_trait]
impl AssetReader for FakeAssetReader {
    async fn read(&self, asset: &AssetRef, _native_crs: Option<Crs>, grid: &TargetGrid) -> raster::Result<Array2<f64>> {
        let not_found = || RasterError::Status {
            url: asset.href.clone(),
            status: 404,
        };

        let value = match self.by_href.get(&asset.href) {
            Some(v) => *v,
            None => {
                let band = asset
                    .href
                    .rsplit('/')
                    .next()
                    .and_then(|key| Band::from_str(key).ok())
                    .ok_or_else(not_found)?;
                *self.by_band.get(&band).ok_or_else(not_found)?
            }
        };

        Ok(Array2::from_elem(grid.shape(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{covering_footprint, scene};
    use raster::GeoTransform;

    #[tokio::test]
    async fn test_catalog_filters_by_range() {
        let catalog = FakeCatalog::new(vec![
            scene("a", (2023, 6, 1), covering_footprint(), 5.0),
            scene("b", (2023, 7, 1), covering_footprint(), 5.0),
        ]);
        let range = DateRange::parse("2023-06-01", "2023-06-30").unwrap();
        let found = catalog
            .search(&covering_footprint(), &range, "sentinel-2-l2a", 10)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
        assert_eq!(catalog.searches(), 1);
    }

    #[tokio::test]
    async fn test_reader_lookup_order() {
        let reader = FakeAssetReader::new()
            .band(Band::Nir, 3000.0)
            .scene_band("a", Band::Nir, 4000.0);
        let grid = TargetGrid::new(Crs::Lambert93, GeoTransform::new(0.0, 20.0, 10.0, -10.0), 2, 2);

        let a = reader.read(&AssetRef::new(crate::asset_href("a", Band::Nir)), None, &grid).await.unwrap();
        let b = reader.read(&AssetRef::new(crate::asset_href("b", Band::Nir)), None, &grid).await.unwrap();
        assert_eq!(a[[0, 0]], 4000.0);
        assert_eq!(b[[1, 1]], 3000.0);

        let missing = reader.read(&AssetRef::new(crate::asset_href("a", Band::Red)), None, &grid).await;
        assert!(matches!(missing, Err(RasterError::Status { status: 404, .. })));
    }
}
