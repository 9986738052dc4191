//! Document storage
//!
//! The ingestion core only needs a small slice of a document database:
//! lookup by natural key, equality filters, conditional insert and upsert.
//! [`DocumentStore`] captures that slice; [`EntityStore`] layers typed
//! get-or-create semantics on top of it.

mod entity;
mod file;
mod memory;

pub use entity::{Entity, EntityStore};
pub use file::FileStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A stored document
pub type Document = serde_json::Map<String, Value>;

/// Result type for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error types for storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Unique index violation on the natural key
    #[error("Duplicate key '{key}' in {collection}")]
    DuplicateKey { collection: Collection, key: String },

    /// Document lacks its natural key field
    #[error("Document in {collection} has no '{field}' field")]
    MissingKey {
        collection: Collection,
        field: &'static str,
    },

    /// Value does not serialize to a JSON object
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend cannot serve requests
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Entity collections, each with a unique index on its natural key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Patients,
    Studies,
    Series,
    Instances,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Patients,
        Collection::Studies,
        Collection::Series,
        Collection::Instances,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Patients => "patients",
            Collection::Studies => "studies",
            Collection::Series => "series",
            Collection::Instances => "instances",
        }
    }

    /// Field holding the natural key
    pub fn key_field(&self) -> &'static str {
        match self {
            Collection::Patients => "patient_id",
            Collection::Studies => "study_instance_uid",
            Collection::Series => "series_uid",
            Collection::Instances => "sop_instance_uid",
        }
    }

    /// Extracts the natural key of a document
    pub fn key_of(&self, doc: &Document) -> StoreResult<String> {
        match doc.get(self.key_field()) {
            Some(Value::String(key)) if !key.is_empty() => Ok(key.clone()),
            _ => Err(StoreError::MissingKey {
                collection: *self,
                field: self.key_field(),
            }),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Query filter for [`DocumentStore::find`]
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every document in the collection
    All,
    /// Documents whose top-level `field` equals `value`
    Eq(String, Value),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, value) => doc.get(field) == Some(value),
        }
    }
}

/// What an [`DocumentStore::update_one`] call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    Inserted,
    NotFound,
}

/// Minimal document database interface
///
/// Implementations must make `insert_one` atomic with respect to the
/// natural-key check, so concurrent get-or-create calls never produce two
/// documents for one key.
pub trait DocumentStore: Send + Sync {
    /// Finds the document with the given natural key
    fn find_one(&self, collection: Collection, key: &str) -> StoreResult<Option<Document>>;

    /// Finds every document matching the filter, ordered by natural key
    fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Document>>;

    /// Inserts a new document
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] if the natural key is taken
    fn insert_one(&self, collection: Collection, doc: Document) -> StoreResult<()>;

    /// Overwrites the fields present in `update`, inserting when `upsert` is set
    fn update_one(
        &self,
        collection: Collection,
        key: &str,
        update: Document,
        upsert: bool,
    ) -> StoreResult<UpdateOutcome>;

    /// Makes previous writes durable
    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_key_of() {
        let study = doc(json!({"study_instance_uid": "1.2.3", "patient_id": "P1"}));
        assert_eq!(Collection::Studies.key_of(&study).unwrap(), "1.2.3");
        assert!(matches!(
            Collection::Patients.key_of(&doc(json!({"patient_id": ""}))),
            Err(StoreError::MissingKey { field: "patient_id", .. })
        ));
    }

    #[test]
    fn test_filter_matches() {
        let series = doc(json!({"series_uid": "1.2", "study_instance_uid": "1.2.3"}));
        assert!(Filter::All.matches(&series));
        assert!(Filter::eq("study_instance_uid", "1.2.3").matches(&series));
        assert!(!Filter::eq("study_instance_uid", "9.9").matches(&series));
        assert!(!Filter::eq("modality", "MR").matches(&series));
    }
}
