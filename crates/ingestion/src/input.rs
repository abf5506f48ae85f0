//! Parcel rows from a header-bearing CSV file.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::error::{IngestionError, Result};

/// One raw input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParcelRecord {
    pub id: String,
    /// Boundary as WKT in the source CRS
    pub geometry_wkt: String,
}

/// Required column names, matched exactly.
#[derive(Debug, Clone)]
pub struct ParcelColumns {
    pub id: String,
    pub geometry: String,
}

impl ParcelColumns {
    pub fn new(id: impl Into<String>, geometry: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            geometry: geometry.into(),
        }
    }
}

/// Read every parcel of a CSV file.
pub fn read_parcels(path: impl AsRef<Path>, columns: &ParcelColumns) -> Result<Vec<ParcelRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let records = read_parcels_from(file, columns)?;
    info!(path = %path.display(), parcels = records.len(), "Read input parcels");
    Ok(records)
}

/// Read parcels from any CSV source.
///
/// A missing required column or an unreadable record fails the whole read.
pub fn read_parcels_from<R: Read>(source: R, columns: &ParcelColumns) -> Result<Vec<ParcelRecord>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(source);

    let headers = reader.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let (id_idx, geometry_idx) = match (position(&columns.id), position(&columns.geometry)) {
        (Some(id), Some(geometry)) => (id, geometry),
        (id, geometry) => {
            let missing: Vec<&str> = [(id, columns.id.as_str()), (geometry, columns.geometry.as_str())]
                .into_iter()
                .filter(|(idx, _)| idx.is_none())
                .map(|(_, name)| name)
                .collect();
            return Err(IngestionError::InputFormat(format!(
                "missing required column(s): {}",
                missing.join(", ")
            )));
        }
    };

    let mut parcels = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let field = |idx: usize| {
            record.get(idx).map(str::to_string).ok_or_else(|| {
                // header is line 1
                IngestionError::InputFormat(format!("record {} has no field {}", line + 2, idx))
            })
        };
        parcels.push(ParcelRecord {
            id: field(id_idx)?,
            geometry_wkt: field(geometry_idx)?,
        });
    }

    Ok(parcels)
}
