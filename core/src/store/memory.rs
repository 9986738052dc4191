use super::{Collection, Document, DocumentStore, Filter, StoreError, StoreResult, UpdateOutcome};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Collections = HashMap<Collection, BTreeMap<String, Document>>;

/// In-process document store
///
/// All collections live behind one lock, so conditional inserts are atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from previously persisted collections
    pub fn from_documents(documents: HashMap<Collection, BTreeMap<String, Document>>) -> Self {
        Self {
            collections: RwLock::new(documents),
        }
    }

    /// Copies every document of a collection, keyed by natural key
    pub fn snapshot(&self, collection: Collection) -> StoreResult<BTreeMap<String, Document>> {
        Ok(self
            .read()?
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: Collection) -> StoreResult<usize> {
        Ok(self.read()?.get(&collection).map_or(0, BTreeMap::len))
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl DocumentStore for MemoryStore {
    fn find_one(&self, collection: Collection, key: &str) -> StoreResult<Option<Document>> {
        Ok(self
            .read()?
            .get(&collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Document>> {
        Ok(self
            .read()?
            .get(&collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn insert_one(&self, collection: Collection, doc: Document) -> StoreResult<()> {
        let key = collection.key_of(&doc)?;
        let mut collections = self.write()?;
        let docs = collections.entry(collection).or_default();
        if docs.contains_key(&key) {
            return Err(StoreError::DuplicateKey { collection, key });
        }
        docs.insert(key, doc);
        Ok(())
    }

    fn update_one(
        &self,
        collection: Collection,
        key: &str,
        update: Document,
        upsert: bool,
    ) -> StoreResult<UpdateOutcome> {
        let mut collections = self.write()?;
        let docs = collections.entry(collection).or_default();

        if let Some(existing) = docs.get_mut(key) {
            for (field, value) in update {
                existing.insert(field, value);
            }
            return Ok(UpdateOutcome::Updated);
        }
        if !upsert {
            return Ok(UpdateOutcome::NotFound);
        }

        let mut doc = update;
        doc.insert(
            collection.key_field().to_string(),
            serde_json::Value::String(key.to_string()),
        );
        docs.insert(key.to_string(), doc);
        Ok(UpdateOutcome::Inserted)
    }
}
