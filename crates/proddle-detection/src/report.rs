//! Serializable output of one correlation run.

use crate::clustering::ClusterParams;
use crate::events::FailureEvent;
use crate::filter::FilterSummary;
use crate::fitness::FitnessVector;
use crate::search::{GenerationStats, Individual, SearchOutcome};
use chrono::{DateTime, Utc};
use proddle_core::{Measurement, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;

/// SHA-256 over the ids and timestamps of a batch, in order.
///
/// Two reports with the same fingerprint were computed over the same
/// measurements.
pub fn dataset_fingerprint(measurements: &[Measurement]) -> String {
    let mut hasher = Sha256::new();
    for m in measurements {
        hasher.update(m.id.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(m.timestamp.to_be_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// How the parameters of a report were chosen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSummary {
    pub seed: u64,
    pub generations: usize,
    pub evaluations: usize,
    pub failed_evaluations: usize,
    pub elapsed_ms: u64,
    pub history: Vec<GenerationStats>,
    pub hall_of_fame: Vec<Individual>,
}

impl From<&SearchOutcome> for SearchSummary {
    fn from(outcome: &SearchOutcome) -> Self {
        Self {
            seed: outcome.seed,
            generations: outcome.history.len().saturating_sub(1),
            evaluations: outcome.evaluations(),
            failed_evaluations: outcome.failures(),
            elapsed_ms: outcome.elapsed_ms,
            history: outcome.history.clone(),
            hall_of_fame: outcome.hall_of_fame.members().to_vec(),
        }
    }
}

/// Result of clustering a batch with one parameter set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub dataset_fingerprint: String,
    /// Measurements clustered (after filtering)
    pub measurement_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterSummary>,
    pub params: ClusterParams,
    pub fitness: FitnessVector,
    pub noise_count: usize,
    pub events: Vec<FailureEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchSummary>,
}

impl CorrelationReport {
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write as pretty JSON, creating parent directories
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report() -> CorrelationReport {
        CorrelationReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            dataset_fingerprint: dataset_fingerprint(&[]),
            measurement_count: 0,
            filter: None,
            params: ClusterParams::new(20.0, 3).unwrap(),
            fitness: FitnessVector::ZERO,
            noise_count: 0,
            events: Vec::new(),
            search: None,
        }
    }

    #[test]
    fn test_fingerprint_tracks_content_and_order() {
        let a = Measurement::failure("a", "x.com", 1, "v1");
        let b = Measurement::failure("b", "x.com", 2, "v1");
        let ab = dataset_fingerprint(&[a.clone(), b.clone()]);

        assert_eq!(ab.len(), 64);
        assert_eq!(ab, dataset_fingerprint(&[a.clone(), b.clone()]));
        assert_ne!(ab, dataset_fingerprint(&[b.clone(), a.clone()]));

        let moved = Measurement::failure("b", "x.com", 3, "v1");
        assert_ne!(ab, dataset_fingerprint(&[a, moved]));
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports").join("run.json");
        let original = report();

        original.write_to(&path).unwrap();
        let loaded =
            CorrelationReport::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(loaded.run_id, original.run_id);
        assert_eq!(loaded.params, original.params);
        assert!(loaded.search.is_none());
    }

    #[test]
    fn test_optional_sections_omitted() {
        let json = report().to_json().unwrap();
        assert!(!json.contains("\"search\""));
        assert!(!json.contains("\"filter\""));
        assert!(json.contains("\"dataset_fingerprint\""));
    }
}
