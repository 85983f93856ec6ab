pub mod bandstructure;
pub mod structure;

pub use bandstructure::{BandStructure, BandStructureSymmLine};
pub use structure::{Lattice, Site, Structure};

use crate::storage::BlobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Compression scheme recorded next to every stored blob reference.
/// Consumers dispatch decompression on this tag; an absent flag in a
/// stored document means the blob was written uncompressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Zlib,
    #[default]
    None,
}

impl Compression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Zlib => "zlib",
            Compression::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub energy: f64,
    pub energy_per_atom: f64,
}

/// One entry of `calcs_reversed`; the most recent calculation comes first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Calc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandstructure_fs_id: Option<BlobId>,
    #[serde(default)]
    pub bandstructure_compression: Compression,
}

/// One document per completed calculation. Field names are part of the
/// wire contract with downstream analysis tools; renaming any of them is
/// a breaking change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: u64,
    pub formula_pretty: String,
    pub formula_anonymous: String,
    pub output: TaskOutput,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub calcs_reversed: Vec<Calc>,
}

/// Singleton counter document tracking the next task id to assign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub c: i64,
}

impl Counter {
    pub const TASK_ID: &'static str = "taskid";

    pub fn zeroed() -> Self {
        Self {
            id: Self::TASK_ID.to_string(),
            c: 0,
        }
    }
}
