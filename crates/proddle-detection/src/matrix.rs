//! Pairwise distance matrix over a measurement batch.
//!
//! # Scaling
//!
//! The matrix is dense: building it takes O(n²) time and holds n² `f64`
//! values (20 000 measurements is already ~3.2 GB). This is a hard limit of
//! the approach, not something the builder works around. Inputs above the
//! configured threshold are logged as a scaling risk and then built in full;
//! nothing is sampled or truncated. Sparse or approximate neighbor search
//! would be a separate clusterer, not a change to this type.

use crate::distance::MeasurementDistance;
use proddle_core::{config::ClusteringConfig, Error, Measurement, Result};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Dense symmetric matrix of pairwise distances, indexed by input position.
///
/// The diagonal holds the distance function's maximum as a placeholder. The
/// clusterer counts a point as its own neighbor only when the radius reaches it.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// An empty (0×0) matrix
    pub fn empty() -> Self {
        Self {
            n: 0,
            values: Vec::new(),
        }
    }

    /// Build from explicit rows, checking shape and symmetry
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        let mut values = Vec::with_capacity(n * n);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(Error::validation(format!(
                    "distance matrix row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            values.extend_from_slice(row);
        }

        let matrix = Self { n, values };
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (matrix.get(i, j), matrix.get(j, i));
                if a.is_nan() || a != b {
                    return Err(Error::validation(format!(
                        "distance matrix is not symmetric at ({}, {}): {} != {}",
                        i, j, a, b
                    )));
                }
            }
        }
        Ok(matrix)
    }

    /// Number of measurements
    pub fn len(&self) -> usize {
        self.n
    }

    /// Whether the matrix covers no measurements
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Distance between measurements `i` and `j`
    ///
    /// # Panics
    /// Panics if either index is out of bounds.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.n && j < self.n, "index ({}, {}) out of bounds", i, j);
        self.values[i * self.n + j]
    }

    /// Row `i` (distances from measurement `i`, diagonal included)
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.n..(i + 1) * self.n]
    }

    /// Indices `j != i` with `distance(i, j) <= radius`
    pub fn neighbors_within(&self, i: usize, radius: f64) -> impl Iterator<Item = usize> + '_ {
        self.row(i)
            .iter()
            .enumerate()
            .filter(move |&(j, &d)| j != i && d <= radius)
            .map(|(j, _)| j)
    }

    /// Pooled k-nearest distance profile.
    ///
    /// For every measurement take its `k` smallest off-diagonal distances,
    /// pool them and sort ascending. The knee of this curve is a good
    /// starting radius for the clusterer.
    pub fn k_distances(&self, k: usize) -> Vec<f64> {
        let k = k.min(self.n.saturating_sub(1));
        let mut pooled = Vec::with_capacity(self.n * k);
        let mut row_buf = Vec::with_capacity(self.n.saturating_sub(1));

        for i in 0..self.n {
            row_buf.clear();
            row_buf.extend(
                self.row(i)
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(_, &d)| d),
            );
            row_buf.sort_by(|a, b| a.total_cmp(b));
            pooled.extend_from_slice(&row_buf[..k]);
        }

        pooled.sort_by(|a, b| a.total_cmp(b));
        pooled
    }
}

/// Builds a [`DistanceMatrix`] from a measurement batch.
#[derive(Debug)]
pub struct DistanceMatrixBuilder<'a> {
    distance: &'a dyn MeasurementDistance,
    warn_threshold: usize,
}

impl<'a> DistanceMatrixBuilder<'a> {
    /// Create a builder around a distance function
    pub fn new(distance: &'a dyn MeasurementDistance) -> Self {
        Self {
            distance,
            warn_threshold: ClusteringConfig::default().matrix_warn_threshold,
        }
    }

    /// Apply clustering configuration
    pub fn with_config(mut self, config: &ClusteringConfig) -> Self {
        self.warn_threshold = config.matrix_warn_threshold;
        self
    }

    /// Compute every pairwise distance
    pub fn build(&self, measurements: &[Measurement]) -> DistanceMatrix {
        let n = measurements.len();
        if n == 0 {
            debug!("Empty measurement batch, returning empty distance matrix");
            return DistanceMatrix::empty();
        }

        if n > self.warn_threshold {
            warn!(
                measurements = n,
                threshold = self.warn_threshold,
                approx_bytes = n.saturating_mul(n).saturating_mul(std::mem::size_of::<f64>()),
                "Dense O(n²) distance matrix beyond recommended size; build will be slow and memory hungry"
            );
        }

        let start = Instant::now();
        let placeholder = self.distance.max_distance();
        let mut values = vec![placeholder; n * n];

        for i in 0..n {
            for j in (i + 1)..n {
                let d = self.distance.distance(&measurements[i], &measurements[j]);
                values[i * n + j] = d;
                values[j * n + i] = d;
            }
        }

        info!(
            measurements = n,
            pairs = n * (n - 1) / 2,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Distance matrix built"
        );

        DistanceMatrix { n, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{TemporalDomainDistance, MAX_DISTANCE};

    fn batch() -> Vec<Measurement> {
        vec![
            Measurement::failure("0", "a.com", 0, "v1"),
            Measurement::failure("1", "a.com", 3600, "v2"),
            Measurement::failure("2", "b.com", 0, "v1"),
            Measurement::failure("3", "a.com", 36_000, "v3"),
        ]
    }

    #[test]
    fn test_build_matches_distance_function() {
        let distance = TemporalDomainDistance::default();
        let measurements = batch();
        let matrix = DistanceMatrixBuilder::new(&distance).build(&measurements);

        assert_eq!(matrix.len(), 4);
        for i in 0..4 {
            assert_eq!(matrix.get(i, i), MAX_DISTANCE);
            for j in 0..4 {
                assert_eq!(matrix.get(i, j), matrix.get(j, i));
                if i != j {
                    assert_eq!(
                        matrix.get(i, j),
                        distance.distance(&measurements[i], &measurements[j])
                    );
                }
            }
        }
        assert_eq!(matrix.get(0, 1), 12.5);
        assert_eq!(matrix.get(0, 2), MAX_DISTANCE);
        assert_eq!(matrix.get(0, 3), MAX_DISTANCE);
    }

    #[test]
    fn test_empty_input() {
        let distance = TemporalDomainDistance::default();
        let matrix = DistanceMatrixBuilder::new(&distance).build(&[]);
        assert!(matrix.is_empty());
        assert!(matrix.k_distances(3).is_empty());
    }

    #[test]
    fn test_single_measurement() {
        let distance = TemporalDomainDistance::default();
        let matrix = DistanceMatrixBuilder::new(&distance).build(&batch()[..1]);
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix.get(0, 0), MAX_DISTANCE);
        assert_eq!(matrix.neighbors_within(0, 1000.0).count(), 0);
    }

    #[test]
    fn test_neighbors_exclude_self() {
        let distance = TemporalDomainDistance::default();
        let matrix = DistanceMatrixBuilder::new(&distance).build(&batch());
        let neighbors: Vec<usize> = matrix.neighbors_within(0, 20.0).collect();
        assert_eq!(neighbors, vec![1]);
        let all: Vec<usize> = matrix.neighbors_within(0, MAX_DISTANCE).collect();
        assert_eq!(all, vec![1, 2, 3]);
    }

    #[test]
    fn test_k_distances_sorted_and_sized() {
        let distance = TemporalDomainDistance::default();
        let matrix = DistanceMatrixBuilder::new(&distance).build(&batch());
        let kd = matrix.k_distances(1);
        assert_eq!(kd.len(), 4);
        assert!(kd.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(kd[0], 12.5);
        assert_eq!(kd[1], 12.5);

        // k larger than n - 1 is clamped
        assert_eq!(matrix.k_distances(10).len(), 4 * 3);
    }

    #[test]
    fn test_from_rows_validation() {
        assert!(DistanceMatrix::from_rows(vec![vec![100.0, 1.0], vec![1.0, 100.0]]).is_ok());
        assert!(DistanceMatrix::from_rows(vec![vec![100.0, 1.0], vec![2.0, 100.0]]).is_err());
        assert!(DistanceMatrix::from_rows(vec![vec![100.0, 1.0], vec![1.0]]).is_err());
        assert!(DistanceMatrix::from_rows(Vec::new()).unwrap().is_empty());
    }
}
