//! DBSCAN on a precomputed distance matrix.
//!
//! Point roles:
//! - **core**: at least `min_size` measurements lie within `radius`. A
//!   point is its own neighbor only when the matrix diagonal is within
//!   `radius`; with the default diagonal of 100 that means `min_size` other
//!   measurements for any radius that keeps domains apart
//! - **border**: not core, but within `radius` of a core point; it joins the
//!   first cluster (in index order) that reaches it
//! - **noise**: reachable from no core point, labeled [`NOISE`]
//!
//! Clusters are numbered `0..k` in the order of their lowest-index core point.

use super::{ClusterParams, Clusterer, Labeling, NOISE};
use crate::matrix::DistanceMatrix;
use proddle_core::Result;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Labels plus the core points that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbscanResult {
    pub labeling: Labeling,
    /// Indices of core points, ascending
    pub core_indices: Vec<usize>,
    /// Number of clusters found
    pub n_clusters: usize,
}

/// Deterministic DBSCAN over a [`DistanceMatrix`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Dbscan;

impl Dbscan {
    /// Create a clusterer
    pub fn new() -> Self {
        Self
    }

    /// Run DBSCAN and keep the core point indices
    pub fn fit(&self, matrix: &DistanceMatrix, params: ClusterParams) -> Result<DbscanResult> {
        params.validate()?;

        let n = matrix.len();
        if n == 0 {
            return Ok(DbscanResult {
                labeling: Labeling::default(),
                core_indices: Vec::new(),
                n_clusters: 0,
            });
        }

        let neighborhoods: Vec<Vec<usize>> = (0..n)
            .map(|i| matrix.neighbors_within(i, params.radius).collect())
            .collect();
        let is_core: Vec<bool> = neighborhoods
            .iter()
            .enumerate()
            .map(|(i, neighbors)| {
                let own = usize::from(matrix.get(i, i) <= params.radius);
                neighbors.len() + own >= params.min_size
            })
            .collect();

        let mut labels = vec![NOISE; n];
        let mut stack = Vec::new();
        let mut next_label: i32 = 0;

        for seed in 0..n {
            if labels[seed] != NOISE || !is_core[seed] {
                continue;
            }

            labels[seed] = next_label;
            stack.push(seed);

            while let Some(point) = stack.pop() {
                for &neighbor in &neighborhoods[point] {
                    if labels[neighbor] != NOISE {
                        continue;
                    }
                    labels[neighbor] = next_label;
                    if is_core[neighbor] {
                        stack.push(neighbor);
                    }
                }
            }

            next_label += 1;
        }

        let core_indices: Vec<usize> = (0..n).filter(|&i| is_core[i]).collect();

        trace!(
            %params,
            measurements = n,
            core_points = core_indices.len(),
            clusters = next_label,
            "DBSCAN complete"
        );

        Ok(DbscanResult {
            labeling: Labeling::from_labels(labels),
            core_indices,
            n_clusters: next_label as usize,
        })
    }
}

impl Clusterer for Dbscan {
    fn cluster(&self, matrix: &DistanceMatrix, params: ClusterParams) -> Result<Labeling> {
        self.fit(matrix, params).map(|result| result.labeling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::TemporalDomainDistance;
    use crate::matrix::DistanceMatrixBuilder;
    use proddle_core::{Error, Measurement};

    fn matrix_for(measurements: &[Measurement]) -> DistanceMatrix {
        let distance = TemporalDomainDistance::default();
        DistanceMatrixBuilder::new(&distance).build(measurements)
    }

    fn params(radius: f64, min_size: usize) -> ClusterParams {
        ClusterParams::new(radius, min_size).unwrap()
    }

    #[test]
    fn test_single_dense_event() {
        // 10 vantages failing on one domain within an hour
        let measurements: Vec<Measurement> = (0..10)
            .map(|i| Measurement::failure(i.to_string(), "a.com", i * 360, format!("v{}", i)))
            .collect();
        let labeling = Dbscan::new()
            .cluster(&matrix_for(&measurements), params(20.0, 3))
            .unwrap();

        assert_eq!(labeling.cluster_count(), 1);
        assert_eq!(labeling.noise_count(), 0);
        assert!(labeling.labels().iter().all(|&l| l == labeling.labels()[0]));
    }

    #[test]
    fn test_two_events_and_noise() {
        let measurements = vec![
            Measurement::failure("0", "a.com", 0, "v1"),
            Measurement::failure("1", "a.com", 600, "v2"),
            Measurement::failure("2", "a.com", 1200, "v3"),
            Measurement::failure("3", "b.com", 0, "v1"),
            Measurement::failure("4", "b.com", 300, "v2"),
            Measurement::failure("5", "b.com", 900, "v3"),
            Measurement::failure("6", "c.com", 0, "v1"),
        ];
        let result = Dbscan::new()
            .fit(&matrix_for(&measurements), params(5.0, 2))
            .unwrap();
        let labels = result.labeling.labels();

        assert_eq!(result.n_clusters, 2);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
        assert_eq!(labels[6], NOISE);
        // clusters are numbered by first core point
        assert_eq!(labels[0], 0);
        assert_eq!(labels[3], 1);
    }

    #[test]
    fn test_border_point_joins_but_does_not_expand() {
        // distances along one domain (radius 12.5 == 1 hour):
        // 0 --1h-- 1 --1h-- 2 --1h-- 3, min_size 2 makes 1 and 2 core, 0 and 3 border
        let measurements: Vec<Measurement> = (0..4)
            .map(|i| Measurement::failure(i.to_string(), "a.com", i * 3600, "v"))
            .collect();
        let result = Dbscan::new()
            .fit(&matrix_for(&measurements), params(12.5, 2))
            .unwrap();
        assert_eq!(result.core_indices, vec![1, 2]);
        assert_eq!(result.labeling.cluster_count(), 1);
        assert_eq!(result.labeling.noise_count(), 0);

        // a border point alone cannot seed a cluster
        let result = Dbscan::new()
            .fit(&matrix_for(&measurements[..2]), params(12.5, 2))
            .unwrap();
        assert_eq!(result.labeling.noise_count(), 2);
    }

    #[test]
    fn test_border_point_claimed_by_first_cluster() {
        // rows: two dense groups both within radius of point 2
        let rows = vec![
            vec![100.0, 1.0, 5.0, 100.0, 100.0],
            vec![1.0, 100.0, 100.0, 100.0, 100.0],
            vec![5.0, 100.0, 100.0, 5.0, 100.0],
            vec![100.0, 100.0, 5.0, 100.0, 1.0],
            vec![100.0, 100.0, 100.0, 1.0, 100.0],
        ];
        let matrix = DistanceMatrix::from_rows(rows).unwrap();
        let result = Dbscan::new().fit(&matrix, params(5.0, 2)).unwrap();
        let labels = result.labeling.labels();
        // 0, 2 and 3 each have two neighbors, so everything merges through 2
        assert_eq!(result.core_indices, vec![0, 2, 3]);
        assert_eq!(result.n_clusters, 1);
        assert!(labels.iter().all(|&l| l == 0));

        // raise min_size so 2 is only a border point of two separate clusters
        let rows = vec![
            vec![100.0, 1.0, 5.0, 100.0, 100.0, 1.0, 100.0],
            vec![1.0, 100.0, 100.0, 100.0, 100.0, 1.0, 100.0],
            vec![5.0, 100.0, 100.0, 5.0, 100.0, 100.0, 100.0],
            vec![100.0, 100.0, 5.0, 100.0, 1.0, 100.0, 1.0],
            vec![100.0, 100.0, 100.0, 1.0, 100.0, 100.0, 1.0],
            vec![1.0, 1.0, 100.0, 100.0, 100.0, 100.0, 100.0],
            vec![100.0, 100.0, 100.0, 1.0, 1.0, 100.0, 100.0],
        ];
        let matrix = DistanceMatrix::from_rows(rows).unwrap();
        let result = Dbscan::new().fit(&matrix, params(5.0, 3)).unwrap();
        let labels = result.labeling.labels();
        assert_eq!(result.core_indices, vec![0, 3]);
        assert_eq!(result.n_clusters, 2);
        assert_eq!(labels[2], labels[0]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_core_needs_min_size_other_points() {
        // three simultaneous failures: each has exactly two neighbors
        let measurements: Vec<Measurement> = (0..3)
            .map(|i| Measurement::failure(i.to_string(), "a.com", 0, format!("v{}", i)))
            .collect();
        let matrix = matrix_for(&measurements);

        let labeling = Dbscan::new().cluster(&matrix, params(20.0, 3)).unwrap();
        assert_eq!(labeling.noise_count(), 3);

        let labeling = Dbscan::new().cluster(&matrix, params(20.0, 2)).unwrap();
        assert_eq!(labeling.cluster_count(), 1);
        assert_eq!(labeling.noise_count(), 0);
    }

    #[test]
    fn test_point_counts_itself_once_radius_reaches_diagonal() {
        let measurements = vec![
            Measurement::failure("0", "a.com", 0, "v1"),
            Measurement::failure("1", "b.com", 0, "v1"),
        ];
        let matrix = matrix_for(&measurements);

        // isolated points stay noise even with min_size 1
        let labeling = Dbscan::new().cluster(&matrix, params(1.0, 1)).unwrap();
        assert_eq!(labeling.noise_count(), 2);

        // at radius 100 the diagonal and the cross-domain pair are both in range
        let result = Dbscan::new().fit(&matrix, params(100.0, 2)).unwrap();
        assert_eq!(result.core_indices, vec![0, 1]);
        assert_eq!(result.n_clusters, 1);

        let result = Dbscan::new().fit(&matrix, params(100.0, 3)).unwrap();
        assert_eq!(result.labeling.noise_count(), 2);
    }

    #[test]
    fn test_empty_matrix() {
        let labeling = Dbscan::new()
            .cluster(&DistanceMatrix::empty(), params(10.0, 2))
            .unwrap();
        assert!(labeling.is_empty());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let matrix = matrix_for(&[Measurement::failure("0", "a.com", 0, "v1")]);
        let bad = ClusterParams {
            radius: 0.0,
            min_size: 2,
        };
        assert!(matches!(
            Dbscan::new().cluster(&matrix, bad),
            Err(Error::InvalidParameter { .. })
        ));
        let bad = ClusterParams {
            radius: 5.0,
            min_size: 0,
        };
        assert!(Dbscan::new().cluster(&matrix, bad).is_err());
    }

    #[test]
    fn test_determinism_and_noise_accounting() {
        let measurements: Vec<Measurement> = (0..40)
            .map(|i| {
                Measurement::failure(
                    i.to_string(),
                    if i % 3 == 0 { "a.com" } else { "b.com" },
                    (i * 977) % 40_000,
                    format!("v{}", i % 7),
                )
            })
            .collect();
        let matrix = matrix_for(&measurements);
        let dbscan = Dbscan::new();

        for (radius, min_size) in [(5.0, 2), (15.0, 3), (40.0, 5), (99.0, 1)] {
            let first = dbscan.cluster(&matrix, params(radius, min_size)).unwrap();
            let second = dbscan.cluster(&matrix, params(radius, min_size)).unwrap();
            assert!(first.same_partition(&second));
            assert_eq!(first.len(), measurements.len());

            let clustered: usize = first.clusters().values().map(Vec::len).sum();
            assert_eq!(clustered + first.noise_count(), measurements.len());
        }
    }
}
