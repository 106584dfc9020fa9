//! JSON-file-backed document store
//!
//! One flat JSON array file per collection under the data root. Collections
//! are loaded lazily on first access and held in memory behind an RwLock;
//! every mutation rewrites the owning file through a temp-file rename so a
//! crash mid-write never truncates a collection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{Error, Result};

use super::{doc_id, merge_patch, DocumentStore, Predicate};

pub struct JsonFileStore {
    data_dir: PathBuf,
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl JsonFileStore {
    /// Open a store rooted at `data_dir`. The directory must already exist;
    /// collection files are created on first write.
    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.data_dir.join(collection)
    }

    /// Load a collection from disk if it is not cached yet
    async fn ensure_loaded(&self, collection: &str) -> Result<()> {
        {
            let cache = self.collections.read().await;
            if cache.contains_key(collection) {
                return Ok(());
            }
        }

        let docs = load_collection_file(&self.collection_path(collection)).await?;
        let mut cache = self.collections.write().await;
        // A concurrent loader may have won the race; keep whichever is present
        cache.entry(collection.to_string()).or_insert(docs);
        Ok(())
    }

    /// Rewrite the collection file from the cached documents
    async fn persist(&self, collection: &str, docs: &[Value]) -> Result<()> {
        let path = self.collection_path(collection);
        let tmp_path = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(docs)?;
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        debug!("Persisted {} ({} documents)", collection, docs.len());
        Ok(())
    }
}

async fn load_collection_file(path: &Path) -> Result<Vec<Value>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let parsed: Value = serde_json::from_slice(&bytes)?;
            match parsed {
                Value::Array(docs) => Ok(docs),
                other => Err(Error::Store(format!(
                    "Collection file {} is not a JSON array (found {})",
                    path.display(),
                    json_type_name(&other)
                ))),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // Absent file means an empty collection, not an error
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn find_all(&self, collection: &str) -> Result<Vec<Value>> {
        self.ensure_loaded(collection).await?;
        let cache = self.collections.read().await;
        Ok(cache.get(collection).cloned().unwrap_or_default())
    }

    async fn find(&self, collection: &str, predicate: Predicate<'_>) -> Result<Vec<Value>> {
        let docs = self.find_all(collection).await?;
        Ok(docs.into_iter().filter(|doc| predicate(doc)).collect())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        self.ensure_loaded(collection).await?;
        let cache = self.collections.read().await;
        Ok(cache
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc_id(doc) == Some(id)).cloned()))
    }

    async fn find_by_ids(&self, collection: &str, ids: &[String]) -> Result<Vec<Value>> {
        self.ensure_loaded(collection).await?;
        let cache = self.collections.read().await;
        let Some(docs) = cache.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|doc| doc_id(doc).is_some_and(|id| ids.iter().any(|want| want == id)))
            .cloned()
            .collect())
    }

    async fn create(&self, collection: &str, doc: Value) -> Result<Value> {
        let Some(id) = doc_id(&doc).map(str::to_string) else {
            return Err(Error::Store(format!(
                "Document for {} is missing a string id",
                collection
            )));
        };

        self.ensure_loaded(collection).await?;
        let mut cache = self.collections.write().await;
        let docs = cache.entry(collection.to_string()).or_default();

        if docs.iter().any(|existing| doc_id(existing) == Some(&id)) {
            return Err(Error::Store(format!(
                "Duplicate id {} in {}",
                id, collection
            )));
        }

        docs.push(doc.clone());
        let snapshot = docs.clone();
        drop(cache);

        self.persist(collection, &snapshot).await?;
        Ok(doc)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<Value> {
        self.ensure_loaded(collection).await?;
        let mut cache = self.collections.write().await;
        let docs = cache.entry(collection.to_string()).or_default();

        let Some(doc) = docs.iter_mut().find(|doc| doc_id(doc) == Some(id)) else {
            return Err(Error::NotFound(format!("{} in {}", id, collection)));
        };

        merge_patch(doc, &patch);
        let updated = doc.clone();
        let snapshot = docs.clone();
        drop(cache);

        self.persist(collection, &snapshot).await?;
        Ok(updated)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        self.ensure_loaded(collection).await?;
        let mut cache = self.collections.write().await;
        let docs = cache.entry(collection.to_string()).or_default();

        let before = docs.len();
        docs.retain(|doc| doc_id(doc) != Some(id));
        let removed = docs.len() != before;

        if !removed {
            warn!("Delete of missing document {} in {}", id, collection);
            return Ok(false);
        }

        let snapshot = docs.clone();
        drop(cache);

        self.persist(collection, &snapshot).await?;
        Ok(true)
    }
}
