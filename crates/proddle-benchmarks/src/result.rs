//! Result record for one benchmark target run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metrics of one target run.
///
/// `metrics` is free-form per target; every target reports at least
/// `total_duration_ms` and `avg_duration_us`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Target identifier, e.g. `"distance_matrix"`
    pub target_id: String,

    /// Target-specific metrics
    pub metrics: serde_json::Value,

    /// When the target ran
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkResult {
    /// Result stamped with the current time
    pub fn new(target_id: impl Into<String>, metrics: serde_json::Value) -> Self {
        Self {
            target_id: target_id.into(),
            metrics,
            timestamp: Utc::now(),
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn metrics(&self) -> &serde_json::Value {
        &self.metrics
    }

    /// Numeric metric by name
    pub fn metric_f64(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).and_then(serde_json::Value::as_f64)
    }

    /// Mean time per iteration in microseconds, when reported
    pub fn avg_duration_us(&self) -> Option<f64> {
        self.metric_f64("avg_duration_us")
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @ {}: {}",
            self.target_id,
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.metrics
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metric_lookup() {
        let result = BenchmarkResult::new(
            "dbscan",
            json!({"avg_duration_us": 12.5, "measurements": 400, "label": "x"}),
        );
        assert_eq!(result.avg_duration_us(), Some(12.5));
        assert_eq!(result.metric_f64("measurements"), Some(400.0));
        assert_eq!(result.metric_f64("label"), None);
        assert_eq!(result.metric_f64("missing"), None);
    }

    #[test]
    fn test_json_round_trip() {
        let result = BenchmarkResult::new("fitness", json!({"avg_duration_us": 3.0}));
        let back = BenchmarkResult::from_json(&result.to_json().unwrap()).unwrap();
        assert_eq!(back.target_id(), "fitness");
        assert_eq!(back.metrics(), result.metrics());
        assert_eq!(back.timestamp, result.timestamp);
    }

    #[test]
    fn test_display() {
        let result = BenchmarkResult::new("search", json!({"value": 42}));
        let shown = result.to_string();
        assert!(shown.starts_with("search @ "));
        assert!(shown.contains("42"));
    }
}
