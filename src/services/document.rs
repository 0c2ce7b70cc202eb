use std::fmt;
use std::path::{Path, PathBuf};

use sled::{Batch, Config, Db, Tree};

use crate::config::BackendKind;
use crate::models::PersistedMetric;
use crate::services::storage::{validate_dataset_name, MetricStore, StorageError};

/// Document backend: an embedded sled database with one tree per dataset.
/// Documents are JSON and keyed by id, so a second write with the same id
/// replaces the first.
///
/// sled holds an exclusive lock on its directory and releases it in the
/// background after the last handle drops, so the `Db` is opened once and
/// shared by clones and by [`DocumentStore::for_collection`].
#[derive(Clone)]
pub struct DocumentStore {
    pub path: PathBuf,
    pub collection: String,
    db: Db,
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore")
            .field("path", &self.path)
            .field("collection", &self.collection)
            .finish()
    }
}

impl DocumentStore {
    pub fn new(path: &Path, collection: &str) -> Result<Self, StorageError> {
        validate_dataset_name(collection)?;

        let db = Config::new().path(path).flush_every_ms(None).open()?;

        Ok(Self {
            path: path.to_path_buf(),
            collection: collection.to_string(),
            db,
        })
    }

    /// Another dataset in the same database, sharing the open handle.
    pub fn for_collection(&self, collection: &str) -> Result<Self, StorageError> {
        validate_dataset_name(collection)?;

        Ok(Self {
            path: self.path.clone(),
            collection: collection.to_string(),
            db: self.db.clone(),
        })
    }

    fn tree_name(&self) -> String {
        format!("collection_{}", self.collection)
    }

    fn open_collection(&self) -> Result<Tree, StorageError> {
        Ok(self.db.open_tree(self.tree_name())?)
    }

    pub fn collection_exists(&self) -> bool {
        let name = self.tree_name();
        self.db.tree_names().iter().any(|existing| &existing[..] == name.as_bytes())
    }

    fn insert_batch(&self, records: &[PersistedMetric]) -> Result<(), StorageError> {
        let tree = self.open_collection()?;

        let mut batch = Batch::default();
        for record in records {
            batch.insert(encode_id(record.id).to_vec(), serde_json::to_vec(record)?);
        }

        tree.apply_batch(batch)?;
        self.db.flush()?;
        Ok(())
    }
}

/// Big-endian with the sign bit flipped so byte order matches numeric order.
fn encode_id(id: i64) -> [u8; 8] {
    ((id as u64) ^ (1 << 63)).to_be_bytes()
}

impl MetricStore for DocumentStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    fn dataset(&self) -> &str {
        &self.collection
    }

    fn ensure_schema(&self) -> Result<(), StorageError> {
        self.open_collection()?;
        self.db.flush()?;
        Ok(())
    }

    fn upsert(&self, records: &[PersistedMetric]) -> Result<(), StorageError> {
        self.insert_batch(records)
    }

    fn replace_all(&self, records: &[PersistedMetric]) -> Result<(), StorageError> {
        self.db.drop_tree(self.tree_name())?;
        self.insert_batch(records)
    }

    fn fetch_recent(&self, limit: usize) -> Result<Vec<PersistedMetric>, StorageError> {
        if !self.collection_exists() {
            return Ok(Vec::new());
        }
        let tree = self.open_collection()?;

        let mut results = Vec::new();
        for entry in tree.iter().rev().take(limit) {
            let (_, value) = entry?;
            results.push(serde_json::from_slice::<PersistedMetric>(&value)?);
        }

        Ok(results)
    }
}
