use crate::error::{MatflowError, Result};
use crate::model::Structure;
use crate::workflow::{Firework, FireworkId, FireworkSpec, Workflow};
use std::path::PathBuf;
use tracing::debug;

pub type DielectricTensor = [[f64; 3]; 3];

/// Parameters for the Raman spectra workflow. All fields have
/// documented defaults; the zero-argument `Default` matches them.
#[derive(Debug, Clone, PartialEq)]
pub struct RamanSpectraParams {
    /// Normal-mode indices to displace along; `None` selects all 3N
    /// modes. An explicitly empty list is rejected.
    pub modes: Option<Vec<usize>>,
    /// Site displacement along each normal mode, in Angstroms.
    /// Default 0.005.
    pub step_size: f64,
    /// External command the calculation fireworks run. Default "vasp".
    pub vasp_cmd: String,
    /// Database-credentials path, passed through to the fireworks
    /// unmodified.
    pub db_file: Option<PathBuf>,
}

impl Default for RamanSpectraParams {
    fn default() -> Self {
        Self {
            modes: None,
            step_size: 0.005,
            vasp_cmd: "vasp".to_string(),
            db_file: None,
        }
    }
}

/// Assemble the static task graph for a Raman susceptibility tensor
/// calculation: a structure optimization, a normal-mode/dielectric
/// run, one displaced dielectric run per (mode, +/-step) pair, and a
/// final central-difference analysis that persists the result.
///
/// Construction is pure and deterministic; all execution is the
/// engine's responsibility.
pub fn raman_spectra_workflow(
    structure: &Structure,
    params: &RamanSpectraParams,
) -> Result<Workflow> {
    if !params.step_size.is_finite() || params.step_size <= 0.0 {
        return Err(MatflowError::InvalidInput(format!(
            "step size must be positive and finite, got {}",
            params.step_size
        )));
    }

    let num_modes = 3 * structure.num_sites();
    let modes: Vec<usize> = match &params.modes {
        Some(modes) if modes.is_empty() => {
            // An empty mode set would leave the analysis node with no
            // parents; reject it instead of handing the engine a
            // graph with an unscheduled orphan.
            return Err(MatflowError::InvalidInput(
                "mode set must not be empty".to_string(),
            ));
        }
        Some(modes) => {
            if let Some(&bad) = modes.iter().find(|&&m| m >= num_modes) {
                return Err(MatflowError::InvalidInput(format!(
                    "mode {} out of range for {} modes",
                    bad, num_modes
                )));
            }
            modes.clone()
        }
        None => (0..num_modes).collect(),
    };

    let formula = structure.reduced_formula();
    let mut fireworks = Vec::with_capacity(2 * modes.len() + 3);
    let mut next_id = 0u32;
    let mut alloc_id = || {
        let id = FireworkId(next_id);
        next_id += 1;
        id
    };

    // Structure optimization.
    let opt_id = alloc_id();
    fireworks.push(Firework {
        id: opt_id,
        name: format!("{}-structure optimization", formula),
        spec: FireworkSpec::Optimize {
            structure: structure.clone(),
            vasp_cmd: params.vasp_cmd.clone(),
            db_file: params.db_file.clone(),
        },
        parents: vec![],
    });

    // Static run computing the normal modes and the undisplaced
    // dielectric tensor.
    let phonon_id = alloc_id();
    fireworks.push(Firework {
        id: phonon_id,
        name: format!("{}-normal modes", formula),
        spec: FireworkSpec::StaticDielectric {
            structure: structure.clone(),
            phonon: true,
            mode: None,
            displacement: None,
            vasp_cmd: params.vasp_cmd.clone(),
            db_file: params.db_file.clone(),
        },
        parents: vec![opt_id],
    });

    // Displacements in both directions along each mode, so the central
    // difference scheme can evaluate the derivative of epsilon.
    let displacements = [-params.step_size, params.step_size];
    let mut displaced_ids = Vec::with_capacity(2 * modes.len());
    for &mode in &modes {
        for displacement in displacements {
            let id = alloc_id();
            displaced_ids.push(id);
            fireworks.push(Firework {
                id,
                name: format!("{}-mode {} disp {}", formula, mode, displacement),
                spec: FireworkSpec::StaticDielectric {
                    structure: structure.clone(),
                    phonon: true,
                    mode: Some(mode),
                    displacement: Some(displacement),
                    vasp_cmd: params.vasp_cmd.clone(),
                    db_file: params.db_file.clone(),
                },
                parents: vec![phonon_id],
            });
        }
    }

    // Raman susceptibility tensor from the displaced runs.
    fireworks.push(Firework {
        id: alloc_id(),
        name: format!("{}-raman analysis", formula),
        spec: FireworkSpec::RamanAnalysis {
            step_size: params.step_size,
            db_file: params.db_file.clone(),
        },
        parents: displaced_ids,
    });

    debug!(
        formula = %formula,
        modes = modes.len(),
        fireworks = fireworks.len(),
        "assembled raman workflow"
    );

    Ok(Workflow::new(format!("{}:raman spectra", formula), fireworks))
}

/// Central-difference first derivative of the dielectric tensor with
/// respect to displacement along one normal mode:
/// `(eps(+s) - eps(-s)) / (2 s)`.
pub fn raman_susceptibility(
    eps_plus: &DielectricTensor,
    eps_minus: &DielectricTensor,
    step_size: f64,
) -> Result<DielectricTensor> {
    if !step_size.is_finite() || step_size <= 0.0 {
        return Err(MatflowError::InvalidInput(format!(
            "step size must be positive and finite, got {}",
            step_size
        )));
    }

    let mut tensor = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            tensor[i][j] = (eps_plus[i][j] - eps_minus[i][j]) / (2.0 * step_size);
        }
    }
    Ok(tensor)
}
