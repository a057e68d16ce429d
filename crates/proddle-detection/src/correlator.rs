//! Failure Event Correlator
//!
//! Front door for the analysis pipeline. One correlator holds a validated
//! [`AnalysisConfig`] and turns measurement batches into
//! [`CorrelationReport`]s:
//!
//! 1. filter the batch (failures only, excluded domains)
//! 2. build the distance matrix once
//! 3. either cluster with given parameters, or tune them with the
//!    evolutionary search and cluster with the best candidate found
//! 4. summarize the clusters as failure events
//!
//! # Usage
//!
//! ```rust,ignore
//! use proddle_detection::FailureEventCorrelator;
//!
//! let correlator = FailureEventCorrelator::new(config)?;
//! let report = correlator.optimize(measurements).await?;
//! println!("{} events", report.event_count());
//! ```

use crate::clustering::{ClusterParams, Dbscan};
use crate::distance::TemporalDomainDistance;
use crate::events;
use crate::filter::{FilterSummary, MeasurementFilter};
use crate::fitness;
use crate::matrix::{DistanceMatrix, DistanceMatrixBuilder};
use crate::report::{dataset_fingerprint, CorrelationReport, SearchSummary};
use crate::search::ParameterSearch;
use chrono::Utc;
use proddle_core::{AnalysisConfig, Error, Measurement, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Correlator statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelatorStats {
    /// Reports produced
    pub runs: u64,
    /// Runs that tuned parameters
    pub searches: u64,
    /// Measurements clustered, after filtering
    pub measurements_processed: u64,
    /// Failure events reported
    pub events_found: u64,
    /// Candidate evaluations that failed during searches
    pub failed_evaluations: u64,
    /// Runs that returned an error
    pub failures: u64,
    /// Average processing time (ms)
    pub avg_processing_ms: f64,
}

/// A filtered batch with its distance matrix, ready to cluster repeatedly
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub measurements: Arc<[Measurement]>,
    pub matrix: Arc<DistanceMatrix>,
    pub filter: FilterSummary,
}

impl PreparedBatch {
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

/// Filtering, matrix and clustering state shared with blocking tasks
#[derive(Debug)]
struct Pipeline {
    config: AnalysisConfig,
    distance: TemporalDomainDistance,
    filter: MeasurementFilter,
    clusterer: Dbscan,
}

impl Pipeline {
    fn prepare(&self, measurements: Vec<Measurement>) -> PreparedBatch {
        let (kept, filter) = self.filter.apply(measurements);
        let matrix = DistanceMatrixBuilder::new(&self.distance)
            .with_config(&self.config.clustering)
            .build(&kept);

        PreparedBatch {
            measurements: kept.into(),
            matrix: Arc::new(matrix),
            filter,
        }
    }

    fn report(
        &self,
        batch: &PreparedBatch,
        params: ClusterParams,
        search: Option<SearchSummary>,
    ) -> Result<CorrelationReport> {
        let result = self.clusterer.fit(&batch.matrix, params)?;
        let fitness = fitness::evaluate(&result.labeling, &batch.measurements)?;
        let events = events::summarize(&result.labeling, &batch.measurements)?;

        debug!(
            %params,
            clusters = result.n_clusters,
            core_points = result.core_indices.len(),
            noise = result.labeling.noise_count(),
            "Batch clustered"
        );

        Ok(CorrelationReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            dataset_fingerprint: dataset_fingerprint(&batch.measurements),
            measurement_count: batch.len(),
            filter: Some(batch.filter),
            params,
            fitness,
            noise_count: result.labeling.noise_count(),
            events,
            search,
        })
    }

    fn optimize(&self, measurements: Vec<Measurement>) -> Result<CorrelationReport> {
        let batch = self.prepare(measurements);
        let search = ParameterSearch::new(
            batch.matrix.clone(),
            batch.measurements.clone(),
            self.clusterer,
            self.config.search.clone(),
        )?;
        let outcome = search.run()?;

        let params = outcome
            .best()
            .and_then(|best| best.params)
            .ok_or_else(|| {
                Error::internal("parameter search produced no decodable candidate")
            })?;

        if outcome.failures() > 0 {
            warn!(
                failed_evaluations = outcome.failures(),
                evaluations = outcome.evaluations(),
                "Some candidates failed evaluation"
            );
        }

        self.report(&batch, params, Some(SearchSummary::from(&outcome)))
    }
}

/// Correlates probe failures into failure events.
///
/// The async entry points run the O(n²) work on the blocking pool.
#[derive(Debug)]
pub struct FailureEventCorrelator {
    pipeline: Arc<Pipeline>,
    stats: RwLock<CorrelatorStats>,
}

impl FailureEventCorrelator {
    /// Create a correlator; fails if the configuration is invalid
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let distance = TemporalDomainDistance::from_config(&config.distance)?;
        let filter = MeasurementFilter::from_config(&config.filter);

        info!(
            cap_hours = distance.cap_hours(),
            population = config.search.population_size,
            generations = config.search.generations,
            failures_only = config.filter.failures_only,
            excluded_domains = config.filter.exclude_domains.len(),
            "Failure event correlator initialized"
        );

        Ok(Self {
            pipeline: Arc::new(Pipeline {
                config,
                distance,
                filter,
                clusterer: Dbscan::new(),
            }),
            stats: RwLock::new(CorrelatorStats::default()),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.pipeline.config
    }

    /// Snapshot of the running statistics
    pub async fn stats(&self) -> CorrelatorStats {
        self.stats.read().await.clone()
    }

    /// Filter a batch and build its distance matrix
    pub fn prepare(&self, measurements: Vec<Measurement>) -> PreparedBatch {
        self.pipeline.prepare(measurements)
    }

    /// Cluster a prepared batch with fixed parameters
    pub fn report(
        &self,
        batch: &PreparedBatch,
        params: ClusterParams,
        search: Option<SearchSummary>,
    ) -> Result<CorrelationReport> {
        self.pipeline.report(batch, params, search)
    }

    /// Pooled k-nearest distances of a prepared batch, in hours
    pub fn k_distance_hours(&self, batch: &PreparedBatch, k: usize) -> Vec<f64> {
        batch
            .matrix
            .k_distances(k)
            .into_iter()
            .map(|d| self.pipeline.distance.to_hours(d))
            .collect()
    }

    /// Cluster `measurements` with fixed parameters
    pub async fn correlate(
        &self,
        measurements: Vec<Measurement>,
        params: ClusterParams,
    ) -> Result<CorrelationReport> {
        let start = Instant::now();
        let result = self
            .run_blocking(move |pipeline| {
                params.validate()?;
                let batch = pipeline.prepare(measurements);
                pipeline.report(&batch, params, None)
            })
            .await;
        self.record(&result, start, false).await;
        result
    }

    /// Tune parameters on `measurements`, then cluster with the best found
    pub async fn optimize(&self, measurements: Vec<Measurement>) -> Result<CorrelationReport> {
        let start = Instant::now();
        let result = self
            .run_blocking(move |pipeline| pipeline.optimize(measurements))
            .await;
        self.record(&result, start, true).await;
        result
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Pipeline) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || f(&pipeline))
            .await
            .map_err(|e| Error::internal(format!("correlation task failed: {}", e)))?
    }

    async fn record(&self, result: &Result<CorrelationReport>, start: Instant, searched: bool) {
        let elapsed_ms = start.elapsed().as_millis() as f64;
        let mut stats = self.stats.write().await;

        match result {
            Ok(report) => {
                stats.runs += 1;
                if searched {
                    stats.searches += 1;
                }
                stats.measurements_processed += report.measurement_count as u64;
                stats.events_found += report.event_count() as u64;
                if let Some(search) = &report.search {
                    stats.failed_evaluations += search.failed_evaluations as u64;
                }
                let n = stats.runs as f64;
                stats.avg_processing_ms = (stats.avg_processing_ms * (n - 1.0) + elapsed_ms) / n;

                info!(
                    run_id = %report.run_id,
                    measurements = report.measurement_count,
                    events = report.event_count(),
                    params = %report.params,
                    fitness = %report.fitness,
                    elapsed_ms,
                    "Correlation complete"
                );
            }
            Err(e) => {
                stats.failures += 1;
                warn!(error = %e, "Correlation failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticBatch;
    use proddle_core::config::SearchConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Ten vantages failing on one domain within an hour
    fn outage() -> Vec<Measurement> {
        (0..10)
            .map(|i| {
                Measurement::failure(
                    format!("m{}", i),
                    "example.com",
                    1_700_000_000 + i * 360,
                    format!("vantage-{}", i),
                )
                .with_error_message("[28] Timeout was reached")
            })
            .collect()
    }

    fn test_config() -> AnalysisConfig {
        AnalysisConfig {
            search: SearchConfig {
                population_size: 12,
                generations: 3,
                seed: Some(17),
                ..SearchConfig::default()
            },
            ..AnalysisConfig::default()
        }
    }

    #[tokio::test]
    async fn test_single_outage_forms_one_event() {
        let correlator = FailureEventCorrelator::new(test_config()).unwrap();
        let params = ClusterParams::new(20.0, 3).unwrap();

        let report = correlator.correlate(outage(), params).await.unwrap();

        assert_eq!(report.event_count(), 1);
        assert_eq!(report.noise_count, 0);
        assert_eq!(report.fitness.avg_vantage_breadth, 10.0);
        assert_eq!(report.fitness.constant, 1.0);
        assert_eq!(report.fitness.avg_failure_density, 10.0);

        let event = &report.events[0];
        assert_eq!(event.member_count(), 10);
        assert_eq!(event.domains, vec!["example.com".to_string()]);
        assert_eq!(event.dominant_error_code(), Some(28));
    }

    #[tokio::test]
    async fn test_successes_and_excluded_domains_are_filtered() {
        let mut config = test_config();
        config.filter.exclude_domains = vec!["always-down.net".to_string()];
        let correlator = FailureEventCorrelator::new(config).unwrap();

        let mut batch = outage();
        batch.push(Measurement::success("ok", "example.com", 1_700_000_000, "vantage-0"));
        batch.push(Measurement::failure("x", "always-down.net", 1_700_000_000, "vantage-1"));

        let report = correlator
            .correlate(batch, ClusterParams::new(20.0, 3).unwrap())
            .await
            .unwrap();

        assert_eq!(report.measurement_count, 10);
        let filter = report.filter.unwrap();
        assert_eq!(filter.dropped_successes, 1);
        assert_eq!(filter.dropped_excluded, 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_not_an_error() {
        let correlator = FailureEventCorrelator::new(test_config()).unwrap();
        let report = correlator
            .correlate(Vec::new(), ClusterParams::new(20.0, 3).unwrap())
            .await
            .unwrap();
        assert_eq!(report.event_count(), 0);
        assert!(report.fitness.is_zero());
    }

    #[tokio::test]
    async fn test_optimize_finds_the_outage() {
        let correlator = FailureEventCorrelator::new(test_config()).unwrap();
        let mut batch = outage();
        // unrelated failures on other domains
        for i in 0..4 {
            batch.push(Measurement::failure(
                format!("n{}", i),
                format!("other{}.org", i),
                1_700_000_000,
                "vantage-0",
            ));
        }

        let report = correlator.optimize(batch).await.unwrap();
        let search = report.search.as_ref().unwrap();

        assert_eq!(search.seed, 17);
        assert_eq!(search.history.len(), 4);
        assert!(!report.fitness.is_zero());
        assert!(report.event_count() >= 1);
        assert!(report.events.iter().any(|e| e.domains.contains(&"example.com".to_string())));

        let stats = correlator.stats().await;
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.searches, 1);
        assert_eq!(stats.measurements_processed, 14);
    }

    #[tokio::test]
    async fn test_stats_count_failures() {
        let correlator = FailureEventCorrelator::new(test_config()).unwrap();
        let bad = ClusterParams {
            radius: 0.0,
            min_size: 3,
        };
        assert!(correlator.correlate(outage(), bad).await.is_err());
        assert_eq!(correlator.stats().await.failures, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = test_config();
        config.distance.cap_hours = 0.0;
        assert!(FailureEventCorrelator::new(config).is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_batch_work_leaves_runtime_free() {
        let correlator = FailureEventCorrelator::new(test_config()).unwrap();
        let batch = SyntheticBatch::with_size(600, 5).generate();

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                }
            })
        };

        let report = correlator
            .correlate(batch, ClusterParams::new(20.0, 3).unwrap())
            .await
            .unwrap();
        ticker.abort();

        assert_eq!(report.measurement_count, 600);
        assert!(ticks.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn test_k_distance_hours() {
        let correlator = FailureEventCorrelator::new(test_config()).unwrap();
        let batch = correlator.prepare(outage());
        let profile = correlator.k_distance_hours(&batch, 1);

        assert_eq!(profile.len(), 10);
        // neighbors are six minutes apart
        assert!(profile.iter().all(|h| (h - 0.1).abs() < 1e-9));
    }
}
