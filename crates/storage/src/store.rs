//! Store traits used by the pipeline driver.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::RasterRow;

/// Persistent destination for parcels and their index rasters.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Start an atomic unit of work.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Post-batch maintenance: spatial index, raster constraints, statistics
    /// and the summary view. Run once after all parcels.
    async fn optimize_storage(&self) -> Result<()>;
}

/// Writes that become visible together on [`commit`](StoreTransaction::commit)
/// or not at all.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Plain insert; an existing id is an error.
    async fn insert_parcel(&mut self, parcel_id: &str, geometry_wkt: &str) -> Result<()>;

    /// Insert rows, silently skipping (parcel, index, date) collisions.
    /// Returns the number of rows actually inserted.
    async fn insert_products(&mut self, rows: &[RasterRow]) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
