use matflow::model::{Lattice, Site, Structure};
use matflow::workflow::raman::{
    raman_spectra_workflow, raman_susceptibility, RamanSpectraParams,
};
use matflow::workflow::FireworkSpec;

fn silicon() -> Structure {
    Structure::new(
        Lattice::cubic(5.43),
        vec![
            Site {
                species: "Si".to_string(),
                coords: [0.0, 0.0, 0.0],
            },
            Site {
                species: "Si".to_string(),
                coords: [0.25, 0.25, 0.25],
            },
        ],
    )
}

#[test]
fn workflow_round_trips_through_engine_handoff_json() {
    let wf = raman_spectra_workflow(&silicon(), &RamanSpectraParams::default()).unwrap();

    let json = serde_json::to_string(&wf).unwrap();
    let back: matflow::Workflow = serde_json::from_str(&json).unwrap();
    assert_eq!(back, wf);

    // The adjacency the engine consumes covers every firework.
    let links = wf.links();
    assert_eq!(links.len(), wf.fireworks.len());
    assert_eq!(wf.roots().len(), 1);
}

#[test]
fn displaced_runs_fan_out_from_the_phonon_node() {
    let wf = raman_spectra_workflow(&silicon(), &RamanSpectraParams::default()).unwrap();
    let links = wf.links();

    let phonon = wf
        .fireworks
        .iter()
        .find(|fw| matches!(fw.spec, FireworkSpec::StaticDielectric { mode: None, .. }))
        .unwrap();

    // 3N = 6 modes, two displacements each, all children of the phonon node.
    assert_eq!(links[&phonon.id].len(), 12);
}

#[test]
fn analysis_reproduces_known_susceptibility() {
    let step = 0.005;
    // Inject two known tensors: eps changes linearly with displacement,
    // so the central difference recovers the slope exactly.
    let slope = 2.5;
    let eps_zero = 11.7;
    let eps_plus = [[eps_zero + slope * step; 3]; 3];
    let eps_minus = [[eps_zero - slope * step; 3]; 3];

    let tensor = raman_susceptibility(&eps_plus, &eps_minus, step).unwrap();
    for row in tensor {
        for value in row {
            assert!((value - slope).abs() < 1e-9);
        }
    }
}

#[test]
fn workflow_scales_with_structure_size() {
    for extra_sites in 0..3 {
        let mut sites = vec![Site {
            species: "C".to_string(),
            coords: [0.0, 0.0, 0.0],
        }];
        for i in 0..extra_sites {
            sites.push(Site {
                species: "C".to_string(),
                coords: [0.1 * (i + 1) as f64, 0.0, 0.0],
            });
        }
        let structure = Structure::new(Lattice::cubic(3.57), sites);

        let wf =
            raman_spectra_workflow(&structure, &RamanSpectraParams::default()).unwrap();
        assert_eq!(wf.fireworks.len(), 6 * structure.num_sites() + 3);
    }
}
