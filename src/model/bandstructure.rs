use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Electronic band structure sampled on a uniform k-point mesh. This is
/// the shape stored in the `bandstructure_fs` blob collection; the full
/// domain object lives with the analysis codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandStructure {
    pub efermi: f64,
    /// Fractional k-point coordinates.
    pub kpoints: Vec<[f64; 3]>,
    /// Eigenvalues indexed as bands[band][kpoint], in eV.
    pub bands: Vec<Vec<f64>>,
}

/// Band structure along high-symmetry lines; carries the label
/// dictionary mapping symmetry-point names to k-points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandStructureSymmLine {
    #[serde(flatten)]
    pub base: BandStructure,
    pub labels_dict: HashMap<String, [f64; 3]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symm_line_flattens_base_fields() {
        let bs = BandStructureSymmLine {
            base: BandStructure {
                efermi: 5.2,
                kpoints: vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]],
                bands: vec![vec![-1.0, -0.5]],
            },
            labels_dict: HashMap::from([("\\Gamma".to_string(), [0.0, 0.0, 0.0])]),
        };

        let value = serde_json::to_value(&bs).unwrap();
        assert_eq!(value["efermi"], 5.2);
        assert!(value["labels_dict"].is_object());

        let back: BandStructureSymmLine = serde_json::from_value(value).unwrap();
        assert_eq!(back, bs);
    }

    #[test]
    fn uniform_blob_parses_without_labels() {
        let json = r#"{"efermi": 0.0, "kpoints": [[0.0,0.0,0.0]], "bands": [[1.0]]}"#;
        let bs: BandStructure = serde_json::from_str(json).unwrap();
        assert_eq!(bs.bands.len(), 1);

        let symm: Result<BandStructureSymmLine, _> = serde_json::from_str(json);
        assert!(symm.is_err());
    }
}
