//! In-memory document store
//!
//! Same semantics as [`JsonFileStore`](super::JsonFileStore) without the
//! filesystem. Used as the repository fake in unit and integration tests,
//! and suitable for ephemeral tooling.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{Error, Result};

use super::{doc_id, merge_patch, DocumentStore, Predicate};

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection wholesale, replacing any existing contents
    pub async fn seed(&self, collection: &str, docs: Vec<Value>) {
        let mut cache = self.collections.write().await;
        cache.insert(collection.to_string(), docs);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_all(&self, collection: &str) -> Result<Vec<Value>> {
        let cache = self.collections.read().await;
        Ok(cache.get(collection).cloned().unwrap_or_default())
    }

    async fn find(&self, collection: &str, predicate: Predicate<'_>) -> Result<Vec<Value>> {
        let docs = self.find_all(collection).await?;
        Ok(docs.into_iter().filter(|doc| predicate(doc)).collect())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let cache = self.collections.read().await;
        Ok(cache
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc_id(doc) == Some(id)).cloned()))
    }

    async fn find_by_ids(&self, collection: &str, ids: &[String]) -> Result<Vec<Value>> {
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

        let mut cache = self.collections.write().await;
        let docs = cache.entry(collection.to_string()).or_default();
        if docs.iter().any(|existing| doc_id(existing) == Some(&id)) {
            return Err(Error::Store(format!(
                "Duplicate id {} in {}",
                id, collection
            )));
        }
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<Value> {
        let mut cache = self.collections.write().await;
        let docs = cache.entry(collection.to_string()).or_default();
        let Some(doc) = docs.iter_mut().find(|doc| doc_id(doc) == Some(id)) else {
            return Err(Error::NotFound(format!("{} in {}", id, collection)));
        };
        merge_patch(doc, &patch);
        Ok(doc.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut cache = self.collections.write().await;
        let docs = cache.entry(collection.to_string()).or_default();
        let before = docs.len();
        docs.retain(|doc| doc_id(doc) != Some(id));
        Ok(docs.len() != before)
    }
}
