pub mod raman;

use crate::model::Structure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Identifier of one firework within a workflow. Ids are assigned
/// sequentially during assembly so that construction is deterministic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FireworkId(pub u32);

/// What one firework computes. The execution engine dispatches on this;
/// assembly only declares it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FireworkSpec {
    /// Structure optimization run.
    Optimize {
        structure: Structure,
        vasp_cmd: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        db_file: Option<PathBuf>,
    },
    /// Static run computing the dielectric tensor; with `phonon` set it
    /// also computes the vibrational normal modes. `mode` and
    /// `displacement` select a structure displaced along that normal
    /// mode; both absent means the undisplaced structure.
    StaticDielectric {
        structure: Structure,
        phonon: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        mode: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        displacement: Option<f64>,
        vasp_cmd: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        db_file: Option<PathBuf>,
    },
    /// Central-difference Raman susceptibility analysis over the
    /// displaced dielectric tensors; persists its result to the task
    /// database.
    RamanAnalysis {
        step_size: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        db_file: Option<PathBuf>,
    },
}

/// One unit of computational work with declared parent dependencies,
/// submitted to the external execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Firework {
    pub id: FireworkId,
    pub name: String,
    pub spec: FireworkSpec,
    /// Ids of fireworks that must complete before this one runs.
    pub parents: Vec<FireworkId>,
}

/// Named, immutable collection of fireworks plus their dependency
/// edges. Constructed once and handed to the execution engine; the
/// engine owns all scheduling, retries, and state from then on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    pub fireworks: Vec<Firework>,
}

impl Workflow {
    pub fn new(name: String, fireworks: Vec<Firework>) -> Self {
        Self { name, fireworks }
    }

    pub fn get(&self, id: FireworkId) -> Option<&Firework> {
        self.fireworks.iter().find(|fw| fw.id == id)
    }

    /// Parent -> children adjacency, the edge form the engine's
    /// ingestion API consumes.
    pub fn links(&self) -> BTreeMap<FireworkId, Vec<FireworkId>> {
        let mut links: BTreeMap<FireworkId, Vec<FireworkId>> = BTreeMap::new();
        for fw in &self.fireworks {
            links.entry(fw.id).or_default();
            for parent in &fw.parents {
                links.entry(*parent).or_default().push(fw.id);
            }
        }
        links
    }

    /// Fireworks with no parents, i.e. the graph roots.
    pub fn roots(&self) -> Vec<FireworkId> {
        self.fireworks
            .iter()
            .filter(|fw| fw.parents.is_empty())
            .map(|fw| fw.id)
            .collect()
    }
}
