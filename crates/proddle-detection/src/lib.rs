//! # Proddle Detection
//!
//! Correlated failure detection for Proddle probe measurements.
//!
//! This crate provides:
//! - A domain-aware temporal distance between measurements
//! - The dense pairwise distance matrix and k-distance profile
//! - DBSCAN over the precomputed matrix
//! - Multi-objective fitness of a clustering
//! - Evolutionary search for the best clustering parameters
//! - Failure event summaries and correlation reports
//!
//! [`FailureEventCorrelator`] ties these together.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod clustering;
pub mod correlator;
pub mod distance;
pub mod events;
pub mod filter;
pub mod fitness;
pub mod matrix;
pub mod report;
pub mod search;
pub mod synthetic;

pub use clustering::{ClusterParams, Clusterer, Dbscan, Labeling, NOISE};
pub use correlator::{CorrelatorStats, FailureEventCorrelator, PreparedBatch};
pub use distance::{MeasurementDistance, TemporalDomainDistance, MAX_DISTANCE};
pub use events::FailureEvent;
pub use fitness::FitnessVector;
pub use matrix::{DistanceMatrix, DistanceMatrixBuilder};
pub use report::CorrelationReport;
pub use search::{ParameterEncoding, ParameterSearch, SearchOutcome};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clustering::{ClusterParams, Clusterer, Dbscan, Labeling, NOISE};
    pub use crate::correlator::FailureEventCorrelator;
    pub use crate::distance::{MeasurementDistance, TemporalDomainDistance};
    pub use crate::events::FailureEvent;
    pub use crate::fitness::FitnessVector;
    pub use crate::matrix::{DistanceMatrix, DistanceMatrixBuilder};
    pub use crate::report::CorrelationReport;
    pub use crate::search::{FitnessRanking, ParameterEncoding, ParameterSearch, SearchOutcome};
    pub use proddle_core::prelude::*;
}
