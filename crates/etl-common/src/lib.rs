//! Common types shared across the spectral ETL crates.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod index;
pub mod retry;
pub mod time;

pub use bbox::BoundingBox;
pub use crs::{Crs, CrsParseError};
pub use error::{EtlError, EtlResult};
pub use index::{Band, SpectralIndex, NODATA};
pub use retry::{backoff_delay, MAX_BACKOFF};
pub use time::{DateRange, TimeParseError};
