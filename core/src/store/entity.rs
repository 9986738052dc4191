use super::{Collection, Document, DocumentStore, Filter, StoreError, StoreResult, UpdateOutcome};
use crate::types::Instance;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// A record stored in its own collection under a natural key
pub trait Entity: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn natural_key(&self) -> &str;
}

fn to_document<T: Serialize>(value: &T) -> StoreResult<Document> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StoreError::Unavailable(format!(
            "expected an object document, got {}",
            other
        ))),
    }
}

fn from_document<E: Entity>(doc: Document) -> StoreResult<E> {
    Ok(serde_json::from_value(serde_json::Value::Object(doc))?)
}

/// Typed access to a [`DocumentStore`]
///
/// Cloning is cheap; clones share the underlying store.
#[derive(Clone)]
pub struct EntityStore {
    store: Arc<dyn DocumentStore>,
}

impl EntityStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Returns the stored entity for the candidate's key, creating it if absent
    ///
    /// The first write for a key wins: when the key already exists the
    /// candidate is discarded and the stored entity is returned unchanged.
    /// The boolean is `true` when this call created the entity.
    pub fn get_or_create<E: Entity>(&self, candidate: E) -> StoreResult<(E, bool)> {
        let key = candidate.natural_key().to_string();
        match self.store.insert_one(E::COLLECTION, to_document(&candidate)?) {
            Ok(()) => {
                debug!("Created {} '{}'", E::COLLECTION, key);
                Ok((candidate, true))
            }
            Err(StoreError::DuplicateKey { .. }) => {
                let existing = self.find::<E>(&key)?.ok_or_else(|| {
                    StoreError::Unavailable(format!(
                        "{} '{}' reported as duplicate but not found",
                        E::COLLECTION,
                        key
                    ))
                })?;
                Ok((existing, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Writes every field of `value` under `key`, inserting if absent
    pub fn upsert<T: Serialize>(
        &self,
        collection: Collection,
        key: &str,
        value: &T,
    ) -> StoreResult<UpdateOutcome> {
        self.store
            .update_one(collection, key, to_document(value)?, true)
    }

    pub fn find<E: Entity>(&self, key: &str) -> StoreResult<Option<E>> {
        self.store
            .find_one(E::COLLECTION, key)?
            .map(from_document)
            .transpose()
    }

    /// Every stored entity of a kind, ordered by natural key
    pub fn list<E: Entity>(&self) -> StoreResult<Vec<E>> {
        self.find_where(&Filter::All)
    }

    /// Entities whose `field` equals `value`
    pub fn find_by<E: Entity>(&self, field: &str, value: &str) -> StoreResult<Vec<E>> {
        self.find_where(&Filter::eq(field, value))
    }

    fn find_where<E: Entity>(&self, filter: &Filter) -> StoreResult<Vec<E>> {
        self.store
            .find(E::COLLECTION, filter)?
            .into_iter()
            .map(from_document)
            .collect()
    }

    /// Raw documents of a collection, for callers that work on loose fields
    pub fn documents(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        self.store.find(collection, &Filter::All)
    }

    /// Stored file paths of a series, ordered by instance number
    ///
    /// Instances without a number sort last, ties break on SOP instance UID.
    pub fn series_files(&self, series_uid: &str) -> StoreResult<Vec<PathBuf>> {
        let mut instances: Vec<Instance> = self.find_by("series_uid", series_uid)?;
        instances.sort_by(|a, b| {
            (a.instance_number.is_none(), a.instance_number, &a.sop_instance_uid).cmp(&(
                b.instance_number.is_none(),
                b.instance_number,
                &b.sop_instance_uid,
            ))
        });
        Ok(instances
            .into_iter()
            .map(|instance| PathBuf::from(instance.file_path))
            .collect())
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.store.flush()
    }
}
