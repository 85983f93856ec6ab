use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lattice vectors in row-major order, in Angstroms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    pub fn cubic(a: f64) -> Self {
        Self {
            matrix: [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub species: String,
    /// Fractional coordinates.
    pub coords: [f64; 3],
}

/// Minimal crystal structure: enough to name a workflow and size its
/// normal-mode set. Full structure handling (symmetry, input generation)
/// belongs to the calculation codes, not this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub lattice: Lattice,
    pub sites: Vec<Site>,
}

impl Structure {
    pub fn new(lattice: Lattice, sites: Vec<Site>) -> Self {
        Self { lattice, sites }
    }

    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    /// Species counts in deterministic (alphabetical) order.
    fn composition(&self) -> BTreeMap<&str, u64> {
        let mut counts = BTreeMap::new();
        for site in &self.sites {
            *counts.entry(site.species.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Chemical formula with counts divided by their greatest common
    /// divisor, e.g. two Si sites give "Si" and four Ga + four As give
    /// "GaAs".
    pub fn reduced_formula(&self) -> String {
        let counts = self.composition();
        let divisor = counts.values().copied().fold(0, gcd).max(1);

        let mut formula = String::new();
        for (species, count) in counts {
            formula.push_str(species);
            let reduced = count / divisor;
            if reduced > 1 {
                formula.push_str(&reduced.to_string());
            }
        }
        formula
    }

    /// Anonymous formula: species replaced by A, B, C... ordered by
    /// increasing reduced count, e.g. Fe2O3 gives "A2B3".
    pub fn anonymous_formula(&self) -> String {
        let counts = self.composition();
        let divisor = counts.values().copied().fold(0, gcd).max(1);

        let mut reduced: Vec<u64> = counts.values().map(|c| c / divisor).collect();
        reduced.sort_unstable();

        let mut formula = String::new();
        for (i, count) in reduced.iter().enumerate() {
            formula.push((b'A' + (i as u8 % 26)) as char);
            if *count > 1 {
                formula.push_str(&count.to_string());
            }
        }
        formula
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}
