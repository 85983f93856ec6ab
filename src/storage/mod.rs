pub mod memory_store;
pub mod sqlite_store;

pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier handed out by the blob store for one stored large object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(pub Uuid);

impl BlobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Declarative index definition over one or more (possibly dotted)
/// document field paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub fields: Vec<(String, SortOrder)>,
    pub unique: bool,
}

impl IndexSpec {
    pub fn ascending(field: &str) -> Self {
        Self {
            fields: vec![(field.to_string(), SortOrder::Ascending)],
            unique: false,
        }
    }

    pub fn unique(field: &str) -> Self {
        Self {
            fields: vec![(field.to_string(), SortOrder::Ascending)],
            unique: true,
        }
    }

    pub fn compound(fields: &[(&str, SortOrder)]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(f, o)| (f.to_string(), *o))
                .collect(),
            unique: false,
        }
    }

    /// Derived index name, e.g. "task_id_1" or
    /// "formula_pretty_1_output.energy_-1_completed_at_-1".
    pub fn name(&self) -> String {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, order)| {
                let dir = match order {
                    SortOrder::Ascending => "1",
                    SortOrder::Descending => "-1",
                };
                format!("{}_{}", field, dir)
            })
            .collect();
        parts.join("_")
    }
}

/// Narrow document-store capability interface. The VASP-specific schema
/// operations compose over this rather than inheriting from a store
/// implementation, so the same schema code runs against the in-memory
/// store in tests and SQLite in deployments.
///
/// `create_index` has create-if-absent semantics: re-creating an index
/// with the same specification is a no-op, which makes schema builds
/// safe to re-run.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, collection: &str, document: serde_json::Value) -> Result<()>;

    /// Find the first document whose field (dotted paths allowed)
    /// equals the given value.
    async fn find_one(
        &self,
        collection: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>>;

    /// Delete every document in the collection; returns the count removed.
    async fn delete_all(&self, collection: &str) -> Result<u64>;

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()>;

    async fn list_indexes(&self, collection: &str) -> Result<Vec<String>>;

    async fn put_blob(&self, collection: &str, data: &[u8]) -> Result<BlobId>;

    async fn get_blob(&self, collection: &str, id: BlobId) -> Result<Vec<u8>>;

    /// Drop every blob in the named blob collection.
    async fn delete_blobs(&self, collection: &str) -> Result<()>;
}

/// Read a dotted field path ("output.energy") out of a JSON document.
pub(crate) fn field_path<'a>(
    document: &'a serde_json::Value,
    path: &str,
) -> Option<&'a serde_json::Value> {
    let mut current = document;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}
