//! One parcel's atomic load.

use tracing::{error, info, instrument};

use crate::error::Result;
use crate::model::RasterRow;
use crate::store::{ProductStore, StoreTransaction};

/// Insert the parcel and all of its rows in a single transaction.
///
/// Any failure rolls the whole unit back and is returned; nothing of the
/// parcel remains. Returns the number of product rows inserted.
#[instrument(skip(store, geometry_wkt, rows), fields(rows = rows.len()))]
pub async fn load_parcel(
    store: &dyn ProductStore,
    parcel_id: &str,
    geometry_wkt: &str,
    rows: &[RasterRow],
) -> Result<u64> {
    let mut tx = store.begin().await?;

    match write(tx.as_mut(), parcel_id, geometry_wkt, rows).await {
        Ok(inserted) => {
            tx.commit().await?;
            info!(inserted = inserted, "Parcel loaded");
            Ok(inserted)
        }
        Err(e) => {
            error!(error = %e, "Parcel load failed, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                error!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}

async fn write(
    tx: &mut dyn StoreTransaction,
    parcel_id: &str,
    geometry_wkt: &str,
    rows: &[RasterRow],
) -> Result<u64> {
    tx.insert_parcel(parcel_id, geometry_wkt).await?;
    if rows.is_empty() {
        return Ok(0);
    }
    tx.insert_products(rows).await
}
