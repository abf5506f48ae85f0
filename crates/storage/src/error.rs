//! Storage error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Migration failed: {0}")]
    MigrationError(String),

    #[error("Parcel {0} already exists")]
    DuplicateParcel(String),

    #[error("Optimization failed: {0}")]
    OptimizeError(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
