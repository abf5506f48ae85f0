//! Per-date scene selection.

use chrono::NaiveDate;
use geo::{Contains, MultiPolygon};
use std::collections::BTreeMap;
use tracing::info;

use crate::scene::Scene;

/// Picks at most one scene per acquisition date.
///
/// A scene qualifies only if its footprint fully contains the parcel
/// boundary. Among qualifying scenes of a date the lowest cloud cover wins;
/// on a tie the scene seen first in catalog order is kept. Dates without a
/// qualifying scene are dropped.
pub struct SceneSelector<'a> {
    boundary: &'a MultiPolygon<f64>,
}

impl<'a> SceneSelector<'a> {
    /// `boundary` must be in the same CRS as the scene footprints (lon/lat).
    pub fn new(boundary: &'a MultiPolygon<f64>) -> Self {
        Self { boundary }
    }

    /// Select scenes, returned in ascending date order.
    pub fn select(&self, scenes: Vec<Scene>) -> Vec<Scene> {
        let mut by_date: BTreeMap<NaiveDate, Option<Scene>> = BTreeMap::new();

        for scene in scenes {
            let slot = by_date.entry(scene.date()).or_insert(None);
            if !scene.footprint.contains(self.boundary) {
                continue;
            }
            let better = match slot {
                Some(best) => scene.cloud_cover < best.cloud_cover,
                None => true,
            };
            if better {
                *slot = Some(scene);
            }
        }

        let mut selected = Vec::with_capacity(by_date.len());
        for (date, best) in by_date {
            match best {
                Some(scene) => selected.push(scene),
                None => info!(
                    date = %date,
                    "Parcel is not fully contained in any scene, date will not be considered"
                ),
            }
        }

        info!(selected = selected.len(), "Selected scenes");
        selected
    }
}
