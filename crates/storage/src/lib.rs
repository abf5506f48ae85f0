//! Storage for the spectral ETL.
//!
//! Provides:
//! - [`ProductStore`] / [`StoreTransaction`]: the seam the pipeline writes through
//! - [`PgProductStore`]: PostGIS implementation (schema migration, bulk raster
//!   inserts, post-batch optimization)
//! - [`MemoryStore`]: in-process implementation with insert-fault injection
//! - [`load_parcel`]: one parcel's atomic load

pub mod error;
pub mod load;
pub mod memory;
pub mod model;
pub mod postgis;
pub mod store;

pub use error::{Result, StorageError};
pub use load::load_parcel;
pub use memory::{MemoryStore, StoredProduct};
pub use model::RasterRow;
pub use postgis::{PgProductStore, PoolSettings};
pub use store::{ProductStore, StoreTransaction};
