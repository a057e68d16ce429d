//! Gene to clustering-parameter mapping.
//!
//! Individuals carry two unconstrained real genes. They are mapped through
//! absolute value and scaling:
//!
//! ```text
//! radius   = |x0| * radius_scale        (default scale 100)
//! min_size = ceil(|x1| * min_size_scale) (default scale 5)
//! ```
//!
//! The mapping fixes the reachable parameter space, so changing it changes
//! tuning results even for identical genomes.

use crate::clustering::ClusterParams;
use proddle_core::{config::SearchConfig, Error, Result};
use serde::{Deserialize, Serialize};

/// Genes per individual
pub const GENOME_LEN: usize = 2;

/// Raw genes of one individual
pub type Genome = [f64; GENOME_LEN];

/// Named transform from genes to [`ClusterParams`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterEncoding {
    pub radius_scale: f64,
    pub min_size_scale: f64,
}

impl Default for ParameterEncoding {
    fn default() -> Self {
        Self {
            radius_scale: 100.0,
            min_size_scale: 5.0,
        }
    }
}

impl ParameterEncoding {
    /// Build from search configuration
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            radius_scale: config.radius_scale,
            min_size_scale: config.min_size_scale,
        }
    }

    /// `|x0| * radius_scale`
    pub fn radius(&self, gene: f64) -> f64 {
        gene.abs() * self.radius_scale
    }

    /// `ceil(|x1| * min_size_scale)`, saturating at `usize::MAX`
    pub fn min_size(&self, gene: f64) -> usize {
        // float-to-int `as` saturates; NaN maps to 0 and is rejected later
        (gene.abs() * self.min_size_scale).ceil() as usize
    }

    /// Map a genome to parameters.
    ///
    /// Fails with `InvalidParameter` when the genome maps outside the legal
    /// range (a zero or non-finite gene). The parameters are never clamped.
    pub fn decode(&self, genome: &Genome) -> Result<ClusterParams> {
        if let Some(bad) = genome.iter().find(|g| !g.is_finite()) {
            return Err(Error::invalid_parameter(
                "gene",
                bad,
                "genes must be finite",
            ));
        }
        ClusterParams::new(self.radius(genome[0]), self.min_size(genome[1]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_mapping() {
        let enc = ParameterEncoding::default();
        let params = enc.decode(&[0.2, 0.5]).unwrap();
        assert!((params.radius - 20.0).abs() < 1e-12);
        assert_eq!(params.min_size, 3); // ceil(2.5)
    }

    #[test]
    fn test_negative_genes_use_absolute_value() {
        let enc = ParameterEncoding::default();
        assert_eq!(enc.decode(&[-0.2, -0.5]).unwrap(), enc.decode(&[0.2, 0.5]).unwrap());
    }

    #[test]
    fn test_min_size_ceiling() {
        let enc = ParameterEncoding::default();
        assert_eq!(enc.min_size(0.01), 1);
        assert_eq!(enc.min_size(0.2), 1);
        assert_eq!(enc.min_size(0.21), 2);
        assert_eq!(enc.min_size(1.0), 5);
        assert_eq!(enc.min_size(3.3), 17);
    }

    #[test]
    fn test_zero_genes_are_rejected_not_clamped() {
        let enc = ParameterEncoding::default();
        assert!(matches!(
            enc.decode(&[0.0, 0.5]),
            Err(Error::InvalidParameter { name: "radius", .. })
        ));
        assert!(matches!(
            enc.decode(&[0.5, 0.0]),
            Err(Error::InvalidParameter { name: "min_size", .. })
        ));
        assert!(enc.decode(&[f64::NAN, 0.5]).is_err());
        assert!(enc.decode(&[0.5, f64::INFINITY]).is_err());
    }

    #[test]
    fn test_custom_scales() {
        let enc = ParameterEncoding {
            radius_scale: 10.0,
            min_size_scale: 2.0,
        };
        let params = enc.decode(&[1.5, 1.2]).unwrap();
        assert_eq!(params.radius, 15.0);
        assert_eq!(params.min_size, 3);
    }
}
