//! Cluster quality scoring.
//!
//! A good parameter choice produces events that are seen from many vantages
//! and that gather many failures each. The score is a three component
//! vector, every component maximized:
//!
//! | component | meaning |
//! |-----------|---------|
//! | `avg_vantage_breadth` | distinct vantages per event, averaged |
//! | `constant` | 1 when any event exists, 0 otherwise |
//! | `avg_failure_density` | members per event, averaged |
//!
//! The constant component carries no magnitude information. It lets a
//! multi-objective ranking tell "some clustering" apart from "nothing
//! clustered" even when the other two components are small.

use crate::clustering::{Labeling, NOISE};
use proddle_core::{Error, Measurement, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Number of fitness components
pub const FITNESS_COMPONENTS: usize = 3;

/// Multi-objective clustering score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessVector {
    pub avg_vantage_breadth: f64,
    pub constant: f64,
    pub avg_failure_density: f64,
}

impl FitnessVector {
    /// The worst score: nothing clustered, or a failed evaluation
    pub const ZERO: FitnessVector = FitnessVector {
        avg_vantage_breadth: 0.0,
        constant: 0.0,
        avg_failure_density: 0.0,
    };

    /// Components in objective order
    pub fn components(&self) -> [f64; FITNESS_COMPONENTS] {
        [
            self.avg_vantage_breadth,
            self.constant,
            self.avg_failure_density,
        ]
    }

    /// Build from components in objective order
    pub fn from_components(c: [f64; FITNESS_COMPONENTS]) -> Self {
        Self {
            avg_vantage_breadth: c[0],
            constant: c[1],
            avg_failure_density: c[2],
        }
    }

    /// Whether this is the zero vector
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for FitnessVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.3}, {}, {:.3})",
            self.avg_vantage_breadth, self.constant, self.avg_failure_density
        )
    }
}

/// Per-event aggregates used by the score
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTally {
    pub distinct_vantages: usize,
    pub members: usize,
}

/// Group measurements by non-noise label and count vantages and members.
pub fn tally_events(
    labeling: &Labeling,
    measurements: &[Measurement],
) -> Result<BTreeMap<i32, EventTally>> {
    if labeling.len() != measurements.len() {
        return Err(Error::validation(format!(
            "labeling covers {} measurements but {} were supplied",
            labeling.len(),
            measurements.len()
        )));
    }

    let mut vantages: BTreeMap<i32, HashSet<&str>> = BTreeMap::new();
    let mut tallies: BTreeMap<i32, EventTally> = BTreeMap::new();

    for (&label, measurement) in labeling.labels().iter().zip(measurements) {
        if label == NOISE {
            continue;
        }
        let tally = tallies.entry(label).or_default();
        tally.members += 1;
        if vantages
            .entry(label)
            .or_default()
            .insert(measurement.vantage.as_str())
        {
            tally.distinct_vantages += 1;
        }
    }

    Ok(tallies)
}

/// Score a labeling of `measurements`.
///
/// Returns [`FitnessVector::ZERO`] when no event was found (including empty
/// input). Fails only if the labeling and the batch have different lengths.
pub fn evaluate(labeling: &Labeling, measurements: &[Measurement]) -> Result<FitnessVector> {
    let tallies = tally_events(labeling, measurements)?;

    let event_count = tallies.len();
    if event_count == 0 {
        return Ok(FitnessVector::ZERO);
    }

    let total_vantages: usize = tallies.values().map(|t| t.distinct_vantages).sum();
    let total_failures: usize = tallies.values().map(|t| t.members).sum();

    Ok(FitnessVector {
        avg_vantage_breadth: total_vantages as f64 / event_count as f64,
        constant: 1.0,
        avg_failure_density: total_failures as f64 / event_count as f64,
    })
}
