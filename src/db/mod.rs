use crate::error::{MatflowError, Result};
use crate::model::{BandStructure, BandStructureSymmLine, Compression, Counter, TaskRecord};
use crate::storage::{BlobId, DocumentStore, IndexSpec, SortOrder};
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, info};

/// Blob collection holding serialized band structures.
pub const BANDSTRUCTURE_FS: &str = "bandstructure_fs";

const COUNTER_COLLECTION: &str = "counter";
const BOLTZTRAP_COLLECTION: &str = "boltztrap";
/// Blob collections cleared by `reset`, each backed by paired
/// files/chunks storage.
const BLOB_COLLECTIONS: [&str; 3] = ["dos_fs", "dos_boltztrap_fs", BANDSTRUCTURE_FS];

const DEFAULT_INDEX_FIELDS: [&str; 4] = [
    "formula_pretty",
    "formula_anonymous",
    "output.energy",
    "output.energy_per_atom",
];

/// Options for `VaspTaskStore::build_indexes`, resolved once at call
/// entry instead of inside the index loop.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Single-field ascending indexes to build; `None` selects the
    /// default formula/energy set.
    pub fields: Option<Vec<String>>,
    /// Advisory flag for backends that support background index
    /// builds; SQLite ignores it.
    pub background: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            fields: None,
            background: true,
        }
    }
}

/// Schema-level operations over the VASP results collection: index
/// management, blob storage with optional zlib compression, band
/// structure retrieval, and the destructive reset.
///
/// Composes over any `DocumentStore` rather than extending one, so the
/// same schema code runs against the in-memory backend in tests and
/// SQLite in deployments.
#[derive(Clone)]
pub struct VaspTaskStore {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl VaspTaskStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_collection(store, "tasks")
    }

    pub fn with_collection(store: Arc<dyn DocumentStore>, collection: &str) -> Self {
        Self {
            store,
            collection: collection.to_string(),
        }
    }

    /// Ensure the unique `task_id` index, the single-field ascending
    /// indexes, and the formula/energy compound indexes. Safe to re-run:
    /// index creation is create-if-absent. Not transactional; a crash
    /// mid-build leaves a partial index set that the next run completes.
    pub async fn build_indexes(&self, options: IndexOptions) -> Result<()> {
        self.store
            .create_index(&self.collection, &IndexSpec::unique("task_id"))
            .await?;

        let fields = options.fields.unwrap_or_else(|| {
            DEFAULT_INDEX_FIELDS.iter().map(|s| s.to_string()).collect()
        });
        for field in &fields {
            self.store
                .create_index(&self.collection, &IndexSpec::ascending(field))
                .await?;
        }

        for formula in ["formula_pretty", "formula_anonymous"] {
            for energy in ["output.energy", "output.energy_per_atom"] {
                let index = IndexSpec::compound(&[
                    (formula, SortOrder::Ascending),
                    (energy, SortOrder::Descending),
                    ("completed_at", SortOrder::Descending),
                ]);
                self.store.create_index(&self.collection, &index).await?;
            }
        }

        debug!(
            collection = %self.collection,
            fields = fields.len(),
            "built task collection indexes"
        );
        Ok(())
    }

    /// Insert one completed-calculation record. A duplicate `task_id`
    /// is rejected by the unique index and surfaces as a storage error.
    pub async fn insert_task(&self, record: &TaskRecord) -> Result<()> {
        let document = serde_json::to_value(record)?;
        self.store.insert(&self.collection, document).await?;
        debug!(task_id = record.task_id, "inserted task record");
        Ok(())
    }

    pub async fn get_task(&self, task_id: u64) -> Result<TaskRecord> {
        let document = self
            .store
            .find_one(&self.collection, "task_id", &serde_json::json!(task_id))
            .await?
            .ok_or_else(|| MatflowError::NotFound(format!("task {}", task_id)))?;

        serde_json::from_value(document).map_err(|e| {
            MatflowError::CorruptData(format!("task {} record: {}", task_id, e))
        })
    }

    /// Store a large object, zlib-compressing it when asked. Returns
    /// the blob id and the compression tag to record next to it.
    pub async fn insert_blob(
        &self,
        data: &[u8],
        collection: &str,
        compress: bool,
    ) -> Result<(BlobId, Compression)> {
        let (payload, compression) = if compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data)?;
            (encoder.finish()?, Compression::Zlib)
        } else {
            (data.to_vec(), Compression::None)
        };

        let id = self.store.put_blob(collection, &payload).await?;
        debug!(
            blob_id = %id,
            collection,
            compression = compression.as_str(),
            bytes = payload.len(),
            "stored blob"
        );
        Ok((id, compression))
    }

    /// Band structure on a uniform mesh for the given task.
    pub async fn band_structure(&self, task_id: u64) -> Result<BandStructure> {
        let bytes = self.bandstructure_bytes(task_id).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            MatflowError::CorruptData(format!("band structure for task {}: {}", task_id, e))
        })
    }

    /// Line-mode (high-symmetry path) band structure for the given task.
    pub async fn line_mode_band_structure(
        &self,
        task_id: u64,
    ) -> Result<BandStructureSymmLine> {
        let bytes = self.bandstructure_bytes(task_id).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            MatflowError::CorruptData(format!("band structure for task {}: {}", task_id, e))
        })
    }

    async fn bandstructure_bytes(&self, task_id: u64) -> Result<Vec<u8>> {
        let record = self.get_task(task_id).await?;

        let calc = record.calcs_reversed.first().ok_or_else(|| {
            MatflowError::NotFound(format!("task {} has no calculations", task_id))
        })?;
        let fs_id = calc.bandstructure_fs_id.ok_or_else(|| {
            MatflowError::NotFound(format!(
                "task {} has no band structure reference",
                task_id
            ))
        })?;

        let stored = self.store.get_blob(BANDSTRUCTURE_FS, fs_id).await?;
        decompress(&stored, calc.bandstructure_compression)
    }

    /// Delete every task record, reset the task-id counter to zero,
    /// clear the auxiliary collections, and rebuild the default
    /// indexes. Destructive and non-reversible.
    pub async fn reset(&self) -> Result<()> {
        let removed = self.store.delete_all(&self.collection).await?;

        self.store.delete_all(COUNTER_COLLECTION).await?;
        self.store
            .insert(
                COUNTER_COLLECTION,
                serde_json::to_value(Counter::zeroed())?,
            )
            .await?;

        self.store.delete_all(BOLTZTRAP_COLLECTION).await?;
        for collection in BLOB_COLLECTIONS {
            self.store.delete_blobs(collection).await?;
        }

        self.build_indexes(IndexOptions::default()).await?;

        info!(
            collection = %self.collection,
            removed_tasks = removed,
            "reset task database"
        );
        Ok(())
    }
}

fn decompress(stored: &[u8], compression: Compression) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(stored.to_vec()),
        Compression::Zlib => {
            let mut decoder = flate2::read::ZlibDecoder::new(stored);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(|e| {
                MatflowError::CorruptData(format!("zlib decompression failed: {}", e))
            })?;
            Ok(out)
        }
    }
}
