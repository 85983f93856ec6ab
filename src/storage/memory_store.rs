use crate::error::{MatflowError, Result};
use crate::storage::{field_path, BlobId, DocumentStore, IndexSpec};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory document store used for tests and local experimentation.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<serde_json::Value>>>>,
    indexes: Arc<RwLock<HashMap<String, HashSet<String>>>>,
    blobs: Arc<RwLock<HashMap<String, HashMap<BlobId, Vec<u8>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn unique_fields(&self, collection: &str) -> Vec<String> {
        let indexes = self.indexes.read().await;
        indexes
            .get(collection)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.strip_prefix("unique:").map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, document: serde_json::Value) -> Result<()> {
        let unique_fields = self.unique_fields(collection).await;

        // Check-and-insert under one write lock so concurrent inserts
        // of the same key cannot both pass the unique check.
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        for field in &unique_fields {
            if let Some(value) = field_path(&document, field) {
                let duplicate = docs.iter().any(|d| field_path(d, field) == Some(value));
                if duplicate {
                    return Err(MatflowError::Storage(format!(
                        "duplicate value for unique index on {}.{}",
                        collection, field
                    )));
                }
            }
        }

        docs.push(document);
        Ok(())
    }

    async fn find_one(
        &self,
        collection: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|docs| {
            docs.iter()
                .find(|d| field_path(d, field) == Some(value))
                .cloned()
        }))
    }

    async fn delete_all(&self, collection: &str) -> Result<u64> {
        let mut collections = self.collections.write().await;
        let removed = collections
            .get_mut(collection)
            .map(|docs| {
                let len = docs.len();
                docs.clear();
                len as u64
            })
            .unwrap_or(0);
        Ok(removed)
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        let names = indexes.entry(collection.to_string()).or_default();
        names.insert(index.name());
        if index.unique {
            if let Some((field, _)) = index.fields.first() {
                names.insert(format!("unique:{}", field));
            }
        }
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<String>> {
        let indexes = self.indexes.read().await;
        let mut names: Vec<String> = indexes
            .get(collection)
            .map(|s| {
                s.iter()
                    .filter(|n| !n.starts_with("unique:"))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    async fn put_blob(&self, collection: &str, data: &[u8]) -> Result<BlobId> {
        let id = BlobId::generate();
        let mut blobs = self.blobs.write().await;
        blobs
            .entry(collection.to_string())
            .or_default()
            .insert(id, data.to_vec());
        Ok(id)
    }

    async fn get_blob(&self, collection: &str, id: BlobId) -> Result<Vec<u8>> {
        let blobs = self.blobs.read().await;
        blobs
            .get(collection)
            .and_then(|c| c.get(&id))
            .cloned()
            .ok_or_else(|| {
                MatflowError::NotFound(format!("blob {} in collection {}", id, collection))
            })
    }

    async fn delete_blobs(&self, collection: &str) -> Result<()> {
        let mut blobs = self.blobs.write().await;
        blobs.remove(collection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_and_find_by_dotted_path() {
        let store = MemoryStore::new();
        store
            .insert("tasks", json!({"task_id": 1, "output": {"energy": -3.0}}))
            .await
            .unwrap();

        let found = store
            .find_one("tasks", "output.energy", &json!(-3.0))
            .await
            .unwrap();
        assert!(found.is_some());

        let missing = store
            .find_one("tasks", "task_id", &json!(2))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicates() {
        let store = MemoryStore::new();
        store
            .create_index("tasks", &IndexSpec::unique("task_id"))
            .await
            .unwrap();

        store.insert("tasks", json!({"task_id": 1})).await.unwrap();
        let err = store.insert("tasks", json!({"task_id": 1})).await;
        assert!(matches!(err, Err(MatflowError::Storage(_))));
    }

    #[tokio::test]
    async fn concurrent_duplicate_inserts_admit_exactly_one() {
        let store = MemoryStore::new();
        store
            .create_index("tasks", &IndexSpec::unique("task_id"))
            .await
            .unwrap();

        let a = store.clone();
        let b = store.clone();
        let (first, second) = tokio::join!(
            tokio::spawn(async move { a.insert("tasks", json!({"task_id": 9})).await }),
            tokio::spawn(async move { b.insert("tasks", json!({"task_id": 9})).await }),
        );

        let results = [first.unwrap(), second.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(MatflowError::Storage(_)))));

        let found = store
            .find_one("tasks", "task_id", &json!(9))
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn create_index_is_idempotent() {
        let store = MemoryStore::new();
        let index = IndexSpec::ascending("formula_pretty");
        store.create_index("tasks", &index).await.unwrap();
        store.create_index("tasks", &index).await.unwrap();

        let names = store.list_indexes("tasks").await.unwrap();
        assert_eq!(names, vec!["formula_pretty_1".to_string()]);
    }

    #[tokio::test]
    async fn blob_round_trip_and_missing_blob() {
        let store = MemoryStore::new();
        let data = b"band structure payload".to_vec();
        let id = store.put_blob("bandstructure_fs", &data).await.unwrap();
        assert_eq!(store.get_blob("bandstructure_fs", id).await.unwrap(), data);

        store.delete_blobs("bandstructure_fs").await.unwrap();
        let err = store.get_blob("bandstructure_fs", id).await;
        assert!(matches!(err, Err(MatflowError::NotFound(_))));
    }
}
