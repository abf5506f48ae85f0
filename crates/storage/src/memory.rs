//! In-process product store.
//!
//! Mirrors the PostGIS store's semantics (staged writes, duplicate parcel
//! rejection, silent product conflicts) and can be told to fail a given
//! insert of a given parcel's transaction.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use etl_common::SpectralIndex;

use crate::error::{Result, StorageError};
use crate::model::RasterRow;
use crate::store::{ProductStore, StoreTransaction};

type ProductKey = (String, SpectralIndex, NaiveDate);

/// A committed product row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProduct {
    pub parcel_id: String,
    pub index: SpectralIndex,
    pub product_date: NaiveDate,
    pub raster: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    parcels: BTreeMap<String, String>,
    products: BTreeMap<ProductKey, Vec<u8>>,
    /// (parcel id, 1-based insert number within its transaction)
    faults: BTreeSet<(String, usize)>,
    optimize_runs: usize,
}

/// Product store held in memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `nth` insert (1-based, parcel insert included) of the
    /// transaction loading `parcel_id` fail.
    pub fn fail_on_insert(&self, parcel_id: &str, nth: usize) {
        self.state().faults.insert((parcel_id.to_string(), nth));
    }

    /// Committed parcel ids, sorted.
    pub fn parcels(&self) -> Vec<String> {
        self.state().parcels.keys().cloned().collect()
    }

    pub fn parcel_geometry(&self, parcel_id: &str) -> Option<String> {
        self.state().parcels.get(parcel_id).cloned()
    }

    /// Committed products of one parcel ordered by (index, date).
    pub fn products(&self, parcel_id: &str) -> Vec<StoredProduct> {
        self.state()
            .products
            .iter()
            .filter(|((parcel, _, _), _)| parcel == parcel_id)
            .map(|((parcel, index, date), raster)| StoredProduct {
                parcel_id: parcel.clone(),
                index: *index,
                product_date: *date,
                raster: raster.clone(),
            })
            .collect()
    }

    pub fn product_count(&self) -> usize {
        self.state().products.len()
    }

    /// How many times [`ProductStore::optimize_storage`] ran.
    pub fn optimize_runs(&self) -> usize {
        self.state().optimize_runs
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            parcel_id: None,
            inserts: 0,
            parcels: Vec::new(),
            products: BTreeMap::new(),
        }))
    }

    async fn optimize_storage(&self) -> Result<()> {
        self.state().optimize_runs += 1;
        Ok(())
    }
}

struct MemoryTransaction {
    store: MemoryStore,
    parcel_id: Option<String>,
    inserts: usize,
    parcels: Vec<(String, String)>,
    products: BTreeMap<ProductKey, Vec<u8>>,
}

impl MemoryTransaction {
    fn count_insert(&mut self, parcel_id: Option<&str>) -> Result<()> {
        self.inserts += 1;
        let parcel = parcel_id.or(self.parcel_id.as_deref()).unwrap_or_default();
        let fault = (parcel.to_string(), self.inserts);
        if self.store.state().faults.contains(&fault) {
            return Err(StorageError::DatabaseError(format!(
                "injected failure on insert {} for parcel {}",
                self.inserts, parcel
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn insert_parcel(&mut self, parcel_id: &str, geometry_wkt: &str) -> Result<()> {
        self.count_insert(Some(parcel_id))?;

        let exists = self.store.state().parcels.contains_key(parcel_id)
            || self.parcels.iter().any(|(id, _)| id == parcel_id);
        if exists {
            return Err(StorageError::DuplicateParcel(parcel_id.to_string()));
        }

        self.parcel_id.get_or_insert_with(|| parcel_id.to_string());
        self.parcels.push((parcel_id.to_string(), geometry_wkt.to_string()));
        Ok(())
    }

    async fn insert_products(&mut self, rows: &[RasterRow]) -> Result<u64> {
        self.count_insert(rows.first().map(|r| r.parcel_id.as_str()))?;

        let committed = self.store.state();
        let mut inserted = 0;
        for row in rows {
            let known = self.parcels.iter().any(|(id, _)| *id == row.parcel_id)
                || committed.parcels.contains_key(&row.parcel_id);
            if !known {
                return Err(StorageError::DatabaseError(format!(
                    "parcel {} does not exist",
                    row.parcel_id
                )));
            }

            let key = (row.parcel_id.clone(), row.index, row.product_date);
            if committed.products.contains_key(&key) || self.products.contains_key(&key) {
                continue;
            }
            self.products.insert(key, row.raster.clone());
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction {
            store,
            parcel_id,
            parcels,
            products,
            ..
        } = *self;

        let mut state = store.state();
        for (id, wkt) in parcels {
            state.parcels.insert(id, wkt);
        }
        for (key, raster) in products {
            state.products.entry(key).or_insert(raster);
        }
        debug!(parcel = ?parcel_id, "Memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        debug!(parcel = ?self.parcel_id, "Memory transaction rolled back");
        Ok(())
    }
}
