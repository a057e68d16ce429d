//! Pre-clustering measurement selection.

use proddle_core::{config::FilterConfig, Measurement};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Counts from one filter pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSummary {
    pub input: usize,
    pub kept: usize,
    pub dropped_successes: usize,
    pub dropped_excluded: usize,
}

/// Drops successful probes and chronically failing domains before clustering.
///
/// Domains that fail everywhere all the time would otherwise form one huge
/// event that says nothing about a correlated outage.
#[derive(Debug, Clone, Default)]
pub struct MeasurementFilter {
    failures_only: bool,
    exclude_domains: HashSet<String>,
}

impl MeasurementFilter {
    pub fn new(failures_only: bool, exclude_domains: impl IntoIterator<Item = String>) -> Self {
        Self {
            failures_only,
            exclude_domains: exclude_domains
                .into_iter()
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(config.failures_only, config.exclude_domains.iter().cloned())
    }

    /// Whether `measurement` survives the filter
    pub fn accepts(&self, measurement: &Measurement) -> bool {
        (!self.failures_only || measurement.has_error) && !self.is_excluded(&measurement.domain)
    }

    fn is_excluded(&self, domain: &str) -> bool {
        !self.exclude_domains.is_empty()
            && self.exclude_domains.contains(&domain.to_ascii_lowercase())
    }

    /// Keep accepted measurements, preserving order
    pub fn apply(&self, measurements: Vec<Measurement>) -> (Vec<Measurement>, FilterSummary) {
        let mut summary = FilterSummary {
            input: measurements.len(),
            ..FilterSummary::default()
        };

        let kept: Vec<Measurement> = measurements
            .into_iter()
            .filter(|m| {
                if self.is_excluded(&m.domain) {
                    summary.dropped_excluded += 1;
                    false
                } else if self.failures_only && !m.has_error {
                    summary.dropped_successes += 1;
                    false
                } else {
                    true
                }
            })
            .collect();
        summary.kept = kept.len();

        debug!(
            input = summary.input,
            kept = summary.kept,
            dropped_successes = summary.dropped_successes,
            dropped_excluded = summary.dropped_excluded,
            "Measurements filtered"
        );
        (kept, summary)
    }
}
