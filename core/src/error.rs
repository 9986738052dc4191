use std::path::PathBuf;
use thiserror::Error;

use crate::config::Domain;
use crate::store::StoreError;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Error types for ingestion operations
#[derive(Error, Debug)]
pub enum IngestError {
    /// DICOM reading error
    #[error("DICOM error: {0}")]
    DicomError(String),

    /// Root path of an ingestion run does not exist
    #[error("Path not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// Directory index cannot be decoded at all
    #[error("Corrupt DICOMDIR {}: {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    /// Required tag absent after every resolution strategy
    #[error("Required {domain} tag '{field}' is missing")]
    MissingRequiredTag { domain: Domain, field: String },

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Document store failure
    #[error("Storage error: {0}")]
    StoreError(#[from] StoreError),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Background ingestion thread panicked
    #[error("Ingestion worker panicked")]
    WorkerPanicked,
}

impl IngestError {
    /// Whether this error aborts a whole run rather than a single file
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IngestError::RootNotFound(_)
                | IngestError::CorruptIndex { .. }
                | IngestError::ConfigError(_)
                | IngestError::StoreError(_)
                | IngestError::WorkerPanicked
        )
    }
}

// Convert dicom-object errors
impl From<dicom_object::ReadError> for IngestError {
    fn from(e: dicom_object::ReadError) -> Self {
        IngestError::DicomError(format!("{}", e))
    }
}

impl From<config::ConfigError> for IngestError {
    fn from(e: config::ConfigError) -> Self {
        IngestError::ConfigError(format!("{}", e))
    }
}
