//! Density-based clustering over a precomputed distance matrix.

pub mod dbscan;

pub use dbscan::{Dbscan, DbscanResult};

use crate::matrix::DistanceMatrix;
use proddle_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label assigned to measurements that belong to no cluster
pub const NOISE: i32 = -1;

/// Clustering hyperparameters: neighborhood radius and minimum neighborhood size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Maximum distance for two measurements to be neighbors
    pub radius: f64,
    /// Neighbors required for a core point. A point only counts itself when
    /// the matrix diagonal lies within `radius`.
    pub min_size: usize,
}

impl ClusterParams {
    /// Create validated parameters
    pub fn new(radius: f64, min_size: usize) -> Result<Self> {
        let params = Self { radius, min_size };
        params.validate()?;
        Ok(params)
    }

    /// Reject values the clusterer cannot honor. Never clamps.
    pub fn validate(&self) -> Result<()> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(Error::invalid_parameter(
                "radius",
                self.radius,
                "must be a finite value greater than 0",
            ));
        }
        if self.min_size < 1 {
            return Err(Error::invalid_parameter(
                "min_size",
                self.min_size,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for ClusterParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "radius={:.3} min_size={}", self.radius, self.min_size)
    }
}

/// Cluster label per measurement, parallel to the input batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labeling {
    labels: Vec<i32>,
}

impl Labeling {
    /// Wrap raw labels (`NOISE` or a non-negative cluster label)
    pub fn from_labels(labels: Vec<i32>) -> Self {
        Self { labels }
    }

    /// Raw labels
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// Number of labeled measurements
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no measurement is labeled
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label of measurement `i`
    pub fn get(&self, i: usize) -> Option<i32> {
        self.labels.get(i).copied()
    }

    /// Whether measurement `i` is noise
    pub fn is_noise(&self, i: usize) -> bool {
        self.get(i) == Some(NOISE)
    }

    /// Number of measurements labeled noise
    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == NOISE).count()
    }

    /// Member indices per non-noise label, ordered by label
    pub fn clusters(&self) -> BTreeMap<i32, Vec<usize>> {
        let mut clusters: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (i, &label) in self.labels.iter().enumerate() {
            if label != NOISE {
                clusters.entry(label).or_default().push(i);
            }
        }
        clusters
    }

    /// Number of distinct non-noise labels
    pub fn cluster_count(&self) -> usize {
        self.clusters().len()
    }

    /// Whether both labelings describe the same partition, ignoring label values
    pub fn same_partition(&self, other: &Labeling) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let mut forward: BTreeMap<i32, i32> = BTreeMap::new();
        let mut backward: BTreeMap<i32, i32> = BTreeMap::new();
        for (&a, &b) in self.labels.iter().zip(other.labels.iter()) {
            if (a == NOISE) != (b == NOISE) {
                return false;
            }
            if a == NOISE {
                continue;
            }
            if *forward.entry(a).or_insert(b) != b || *backward.entry(b).or_insert(a) != a {
                return false;
            }
        }
        true
    }
}

/// Assigns cluster labels from a distance matrix.
pub trait Clusterer: Send + Sync + fmt::Debug {
    /// Cluster every measurement covered by `matrix`
    fn cluster(&self, matrix: &DistanceMatrix, params: ClusterParams) -> Result<Labeling>;
}
