pub mod db;
pub mod error;
pub mod model;
pub mod storage;
pub mod workflow;

pub use db::{IndexOptions, VaspTaskStore};
pub use error::{MatflowError, Result};
pub use model::{Compression, TaskRecord};
pub use storage::{BlobId, DocumentStore, MemoryStore, SqliteStore};
pub use workflow::raman::{raman_spectra_workflow, RamanSpectraParams};
pub use workflow::{Firework, FireworkId, FireworkSpec, Workflow};
