//! Per-parcel outcomes of a batch.

use std::fmt;

use crate::error::IngestionError;

/// Where a parcel failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Geometry,
    Raster,
    Load,
}

impl Stage {
    /// Stage an error is isolated to, or `None` if it must abort the batch.
    pub fn isolating(error: &IngestionError) -> Option<Stage> {
        match error {
            IngestionError::Geometry(_) => Some(Stage::Geometry),
            IngestionError::Raster(_) => Some(Stage::Raster),
            IngestionError::Storage(_) => Some(Stage::Load),
            IngestionError::FileRead(_)
            | IngestionError::InputFormat(_)
            | IngestionError::Catalog(_)
            | IngestionError::InvalidConfig(_) => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Geometry => write!(f, "geometry"),
            Stage::Raster => write!(f, "raster"),
            Stage::Load => write!(f, "load"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParcelOutcome {
    /// Committed with this many product rows
    Loaded { rows: u64 },
    /// Dry run: rows encoded, nothing written
    Validated { rows: usize },
    Failed { stage: Stage, error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParcelReport {
    pub parcel_id: String,
    pub outcome: ParcelOutcome,
}

/// Outcomes in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub parcels: Vec<ParcelReport>,
    /// Whether post-batch storage maintenance ran
    pub optimized: bool,
}

impl BatchReport {
    pub fn push(&mut self, parcel_id: impl Into<String>, outcome: ParcelOutcome) {
        self.parcels.push(ParcelReport {
            parcel_id: parcel_id.into(),
            outcome,
        });
    }

    pub fn succeeded(&self) -> usize {
        self.parcels
            .iter()
            .filter(|p| !matches!(p.outcome, ParcelOutcome::Failed { .. }))
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ParcelReport> {
        self.parcels
            .iter()
            .filter(|p| matches!(p.outcome, ParcelOutcome::Failed { .. }))
    }

    /// Product rows committed across the batch.
    pub fn rows_loaded(&self) -> u64 {
        self.parcels
            .iter()
            .map(|p| match p.outcome {
                ParcelOutcome::Loaded { rows } => rows,
                _ => 0,
            })
            .sum()
    }

    pub fn outcome(&self, parcel_id: &str) -> Option<&ParcelOutcome> {
        self.parcels
            .iter()
            .find(|p| p.parcel_id == parcel_id)
            .map(|p| &p.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeometryError;

    #[test]
    fn test_counts() {
        let mut report = BatchReport::default();
        report.push("a", ParcelOutcome::Loaded { rows: 4 });
        report.push(
            "b",
            ParcelOutcome::Failed {
                stage: Stage::Load,
                error: "duplicate".into(),
            },
        );
        report.push("c", ParcelOutcome::Loaded { rows: 2 });

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.rows_loaded(), 6);
        assert_eq!(report.outcome("c"), Some(&ParcelOutcome::Loaded { rows: 2 }));
    }

    #[test]
    fn test_isolating_stages() {
        let geometry = IngestionError::Geometry(GeometryError::NegativeDistance(-1.0));
        assert_eq!(Stage::isolating(&geometry), Some(Stage::Geometry));
        assert_eq!(Stage::isolating(&IngestionError::InputFormat("x".into())), None);
    }
}
