use super::{
    Collection, Document, DocumentStore, Filter, MemoryStore, StoreError, StoreResult,
    UpdateOutcome,
};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Document store persisted as one JSON file per collection
///
/// Documents are served from memory; [`DocumentStore::flush`] rewrites the
/// collection files atomically (temporary file, then rename).
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Opens (or creates) a store rooted at `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or a collection
    /// file is not a JSON object of documents
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut documents = HashMap::new();
        for collection in Collection::ALL {
            let path = collection_path(&dir, collection);
            if !path.is_file() {
                continue;
            }
            let text = fs::read_to_string(&path)?;
            let docs: BTreeMap<String, Document> = serde_json::from_str(&text)?;
            debug!("Loaded {} {} from {}", docs.len(), collection, path.display());
            documents.insert(collection, docs);
        }

        Ok(Self {
            dir,
            inner: MemoryStore::from_documents(documents),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn collection_path(dir: &Path, collection: Collection) -> PathBuf {
    dir.join(format!("{}.json", collection.name()))
}

impl DocumentStore for FileStore {
    fn find_one(&self, collection: Collection, key: &str) -> StoreResult<Option<Document>> {
        self.inner.find_one(collection, key)
    }

    fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Document>> {
        self.inner.find(collection, filter)
    }

    fn insert_one(&self, collection: Collection, doc: Document) -> StoreResult<()> {
        self.inner.insert_one(collection, doc)
    }

    fn update_one(
        &self,
        collection: Collection,
        key: &str,
        update: Document,
        upsert: bool,
    ) -> StoreResult<UpdateOutcome> {
        self.inner.update_one(collection, key, update, upsert)
    }

    fn flush(&self) -> StoreResult<()> {
        if !self.dir.is_dir() {
            return Err(StoreError::Unavailable(format!(
                "store directory {} is gone",
                self.dir.display()
            )));
        }

        for collection in Collection::ALL {
            let docs = self.inner.snapshot(collection)?;
            let path = collection_path(&self.dir, collection);
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, serde_json::to_vec_pretty(&docs)?)?;
            fs::rename(&tmp, &path)?;
        }
        info!("Flushed store to {}", self.dir.display());
        Ok(())
    }
}
