//! Sequential per-parcel orchestration.

use tracing::{error, info, instrument, warn};

use etl_common::DateRange;
use raster::{AssetReader, RasterStackBuilder, TargetGrid};
use scene_catalog::{SceneCatalog, SceneSelector};
use storage::{load_parcel, ProductStore, RasterRow};

use crate::cloud_mask::cloud_mask;
use crate::config::PipelineSettings;
use crate::error::Result;
use crate::geometry::{GeometryPreparer, PreparedParcel};
use crate::index::compute_index;
use crate::input::ParcelRecord;
use crate::report::{BatchReport, ParcelOutcome, Stage};
use crate::serialize::serialize_index;

/// Runs the ETL over a batch of parcels, one at a time and in input order.
///
/// Geometry, raster and load failures are recorded against the parcel and
/// the batch moves on. Catalog failures and post-batch maintenance failures
/// abort the run.
pub struct PipelineDriver<'a> {
    catalog: &'a dyn SceneCatalog,
    reader: &'a dyn AssetReader,
    settings: PipelineSettings,
    preparer: GeometryPreparer,
}

impl<'a> PipelineDriver<'a> {
    pub fn new(catalog: &'a dyn SceneCatalog, reader: &'a dyn AssetReader, settings: PipelineSettings) -> Self {
        let preparer = GeometryPreparer::from_settings(&settings);
        Self {
            catalog,
            reader,
            settings,
            preparer,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Process every parcel, then run storage maintenance once.
    ///
    /// With `store` set to `None` this is a dry run: rows are computed and
    /// encoded but nothing is written and maintenance is skipped.
    pub async fn run(
        &self,
        parcels: &[ParcelRecord],
        range: &DateRange,
        store: Option<&dyn ProductStore>,
    ) -> Result<BatchReport> {
        info!(
            parcels = parcels.len(),
            range = %range,
            load = store.is_some(),
            "Starting batch"
        );

        let mut report = BatchReport::default();

        for record in parcels {
            let outcome = match self.process_parcel(record, range, store).await {
                Ok(outcome) => outcome,
                Err(e) => match Stage::isolating(&e) {
                    Some(stage) => {
                        error!(parcel = %record.id, stage = %stage, error = %e, "Parcel failed");
                        ParcelOutcome::Failed {
                            stage,
                            error: e.to_string(),
                        }
                    }
                    None => return Err(e),
                },
            };
            report.push(record.id.clone(), outcome);
        }

        if let Some(store) = store {
            store.optimize_storage().await?;
            report.optimized = true;
        }

        let failed = report.failed().count();
        if failed > 0 {
            warn!(failed = failed, "Some parcels failed");
        }
        info!(
            succeeded = report.succeeded(),
            failed = failed,
            rows_loaded = report.rows_loaded(),
            "Batch complete"
        );

        Ok(report)
    }

    #[instrument(skip(self, record, range, store), fields(parcel = %record.id))]
    async fn process_parcel(
        &self,
        record: &ParcelRecord,
        range: &DateRange,
        store: Option<&dyn ProductStore>,
    ) -> Result<ParcelOutcome> {
        let parcel = self.preparer.prepare(&record.id, &record.geometry_wkt)?;
        let rows = self.compute_rows(&parcel, range).await?;

        match store {
            Some(store) => {
                let inserted = load_parcel(store, &parcel.id, &parcel.boundary_wkt(), &rows).await?;
                Ok(ParcelOutcome::Loaded { rows: inserted })
            }
            None => {
                info!(rows = rows.len(), "Dry run, parcel not loaded");
                Ok(ParcelOutcome::Validated { rows: rows.len() })
            }
        }
    }

    /// Search, select, stack, mask, index and encode one parcel.
    pub async fn compute_rows(&self, parcel: &PreparedParcel, range: &DateRange) -> Result<Vec<RasterRow>> {
        let scenes = self
            .catalog
            .search(
                &parcel.search_boundary,
                range,
                &self.settings.collection,
                self.settings.catalog_limit,
            )
            .await?;
        let selected = SceneSelector::new(&parcel.search_boundary).select(scenes);

        let grid = TargetGrid::from_geographic_bounds(
            &parcel.search_bounds,
            self.settings.target_crs,
            self.settings.resolution,
        )?;

        let Some(stack) = RasterStackBuilder::new(self.reader).build(&selected, &grid).await? else {
            info!("No usable scene, parcel has no products");
            return Ok(Vec::new());
        };

        let mask = cloud_mask(stack.band(etl_common::Band::Scl));

        let mut rows = Vec::new();
        for &index in &self.settings.indices {
            let array = compute_index(&stack, index, mask.view());
            rows.extend(serialize_index(&parcel.id, &array, stack.times(), stack.grid())?);
        }

        info!(
            dates = stack.len(),
            rows = rows.len(),
            "Computed parcel products"
        );
        Ok(rows)
    }
}
