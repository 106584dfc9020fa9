//! Document store abstraction
//!
//! The platform's system of record is a set of flat JSON collections, one
//! per entity type. Services depend on the [`DocumentStore`] trait rather
//! than a concrete backend so handlers and the optimizer can run against
//! the file-backed store in production and [`MemoryStore`] in tests.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::Result;

pub mod json_file;
pub mod memory;
pub mod models;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Collection names, matching the platform's flat-file layout
pub mod collections {
    pub const USERS: &str = "users.json";
    pub const SESSIONS: &str = "sessions.json";
    pub const CLASSES: &str = "classes.json";
    pub const ENROLLMENTS: &str = "enrollments.json";
    pub const OPTIMIZATION_PLANS: &str = "optimization-plans.json";
    pub const APPROVAL_REQUESTS: &str = "approval-requests.json";
    pub const NOTIFICATIONS: &str = "notifications.json";
}

/// Predicate used by [`DocumentStore::find`]
pub type Predicate<'a> = &'a (dyn Fn(&Value) -> bool + Sync);

/// Generic per-collection CRUD over JSON documents.
///
/// Documents are JSON objects carrying a string `id` field unique within
/// their collection. Implementations must preserve insertion order across
/// reads so that scans over a given snapshot are deterministic.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents in a collection, in stable insertion order
    async fn find_all(&self, collection: &str) -> Result<Vec<Value>>;

    /// Documents matching a predicate, in stable insertion order
    async fn find(&self, collection: &str, predicate: Predicate<'_>) -> Result<Vec<Value>>;

    /// Single document by id, or None
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Batched lookup by ids; missing ids are silently absent from the result
    async fn find_by_ids(&self, collection: &str, ids: &[String]) -> Result<Vec<Value>>;

    /// Insert a new document. The document must carry a string `id` that is
    /// not already present in the collection. Returns the stored document.
    async fn create(&self, collection: &str, doc: Value) -> Result<Value>;

    /// Shallow-merge a patch object into the document with the given id.
    /// The `id` field is never changed. Returns the updated document.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<Value>;

    /// Remove a document by id. Returns whether a document was removed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;
}

/// Extract the `id` field from a stored document
pub fn doc_id(doc: &Value) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}

/// Decode one document into a typed record, or None if it does not fit.
///
/// Malformed documents are skipped rather than failing the caller: scans
/// must degrade gracefully when a record in a shared collection predates
/// the current schema.
pub fn decode<T: DeserializeOwned>(doc: Value) -> Option<T> {
    match serde_json::from_value::<T>(doc) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Skipping undecodable document: {}", e);
            None
        }
    }
}

/// Decode a batch of documents, dropping those that fail to decode
pub fn decode_all<T: DeserializeOwned>(docs: Vec<Value>) -> Vec<T> {
    docs.into_iter().filter_map(decode).collect()
}

/// Shallow-merge `patch` object fields into `doc`, preserving `id`
pub(crate) fn merge_patch(doc: &mut Value, patch: &Value) {
    if let (Some(target), Some(source)) = (doc.as_object_mut(), patch.as_object()) {
        for (key, value) in source {
            if key == "id" {
                continue;
            }
            target.insert(key.clone(), value.clone());
        }
    }
}
