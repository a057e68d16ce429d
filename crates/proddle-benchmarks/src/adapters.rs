//! Benchmark targets for each pipeline stage.
//!
//! Every target works on a seeded synthetic batch, so runs are comparable
//! across machines and commits. The CPU-bound work runs on the blocking
//! pool to keep the async runtime responsive.

use crate::result::BenchmarkResult;
use anyhow::Context;
use async_trait::async_trait;
use proddle_core::config::SearchConfig;
use proddle_detection::{
    fitness, synthetic::SyntheticBatch, ClusterParams, Dbscan, DistanceMatrix,
    DistanceMatrixBuilder, ParameterSearch, TemporalDomainDistance,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A benchmarkable pipeline stage.
#[async_trait]
pub trait BenchTarget: Send + Sync {
    /// Stable identifier used in file names and summaries
    fn id(&self) -> &str;

    /// Run the benchmark once and report its metrics
    async fn run(&self) -> anyhow::Result<BenchmarkResult>;

    fn description(&self) -> &str {
        "No description available"
    }
}

/// Shared sizing for all targets
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Measurements in the synthetic batch
    pub measurements: usize,
    /// Repetitions of the timed operation
    pub iterations: usize,
    pub seed: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            measurements: 400,
            iterations: 10,
            seed: 7,
        }
    }
}

impl BenchConfig {
    fn batch(&self) -> SyntheticBatch {
        SyntheticBatch::with_size(self.measurements, self.seed)
    }

    fn iterations(&self) -> usize {
        self.iterations.max(1)
    }
}

/// Reference parameters: 20 distance units (1.6 h at the default cap), 3 members
fn reference_params() -> anyhow::Result<ClusterParams> {
    Ok(ClusterParams::new(20.0, 3)?)
}

fn build_matrix(config: &BenchConfig) -> (Arc<DistanceMatrix>, Arc<[proddle_core::Measurement]>) {
    let measurements = config.batch().generate();
    let distance = TemporalDomainDistance::default();
    let matrix = DistanceMatrixBuilder::new(&distance).build(&measurements);
    (Arc::new(matrix), measurements.into())
}

fn timing_metrics(iterations: usize, elapsed: Duration) -> serde_json::Value {
    json!({
        "iterations": iterations,
        "total_duration_ms": elapsed.as_millis() as u64,
        "avg_duration_us": elapsed.as_micros() as f64 / iterations as f64,
        "ops_per_second": iterations as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
    })
}

fn merge(mut base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
    if let (Some(base), serde_json::Value::Object(extra)) = (base.as_object_mut(), extra) {
        base.extend(extra);
    }
    base
}

async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("benchmark task panicked")?
}

/// Registry of every target at the given size
pub fn all_targets(config: BenchConfig) -> Vec<Arc<dyn BenchTarget>> {
    vec![
        Arc::new(MatrixBuildTarget::new(config)),
        Arc::new(DbscanTarget::new(config)),
        Arc::new(FitnessTarget::new(config)),
        Arc::new(ParameterSearchTarget::new(config)),
    ]
}

/// Dense O(n²) matrix construction
#[derive(Debug, Clone, Default)]
pub struct MatrixBuildTarget {
    config: BenchConfig,
}

impl MatrixBuildTarget {
    pub fn new(config: BenchConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BenchTarget for MatrixBuildTarget {
    fn id(&self) -> &str {
        "distance_matrix"
    }

    fn description(&self) -> &str {
        "Builds the pairwise distance matrix of a synthetic batch"
    }

    async fn run(&self) -> anyhow::Result<BenchmarkResult> {
        let config = self.config;
        let metrics = blocking(move || {
            let measurements = config.batch().generate();
            let distance = TemporalDomainDistance::default();
            let builder = DistanceMatrixBuilder::new(&distance);

            let start = Instant::now();
            let mut cells = 0;
            for _ in 0..config.iterations() {
                cells = builder.build(&measurements).len().pow(2);
            }
            let elapsed = start.elapsed();

            Ok(merge(
                timing_metrics(config.iterations(), elapsed),
                json!({
                    "measurements": measurements.len(),
                    "matrix_cells": cells,
                    "matrix_bytes": cells * std::mem::size_of::<f64>(),
                }),
            ))
        })
        .await?;

        Ok(BenchmarkResult::new(self.id(), metrics))
    }
}

/// DBSCAN over a prebuilt matrix with the reference parameters
#[derive(Debug, Clone, Default)]
pub struct DbscanTarget {
    config: BenchConfig,
}

impl DbscanTarget {
    pub fn new(config: BenchConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BenchTarget for DbscanTarget {
    fn id(&self) -> &str {
        "dbscan"
    }

    fn description(&self) -> &str {
        "Clusters a prebuilt distance matrix with DBSCAN"
    }

    async fn run(&self) -> anyhow::Result<BenchmarkResult> {
        let config = self.config;
        let metrics = blocking(move || {
            let (matrix, _) = build_matrix(&config);
            let params = reference_params()?;
            let dbscan = Dbscan::new();

            let start = Instant::now();
            let mut last = None;
            for _ in 0..config.iterations() {
                last = Some(dbscan.fit(&matrix, params)?);
            }
            let elapsed = start.elapsed();

            let (clusters, noise) = last
                .map(|r| (r.n_clusters, r.labeling.noise_count()))
                .unwrap_or_default();
            Ok(merge(
                timing_metrics(config.iterations(), elapsed),
                json!({
                    "measurements": matrix.len(),
                    "clusters": clusters,
                    "noise": noise,
                }),
            ))
        })
        .await?;

        Ok(BenchmarkResult::new(self.id(), metrics))
    }
}

/// Fitness scoring of a fixed labeling
#[derive(Debug, Clone, Default)]
pub struct FitnessTarget {
    config: BenchConfig,
}

impl FitnessTarget {
    pub fn new(config: BenchConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BenchTarget for FitnessTarget {
    fn id(&self) -> &str {
        "fitness"
    }

    fn description(&self) -> &str {
        "Scores a clustering of a synthetic batch"
    }

    async fn run(&self) -> anyhow::Result<BenchmarkResult> {
        let config = self.config;
        let metrics = blocking(move || {
            let (matrix, measurements) = build_matrix(&config);
            let labeling = Dbscan::new().fit(&matrix, reference_params()?)?.labeling;

            // scoring alone is fast; repeat it enough to time reliably
            let iterations = config.iterations() * 100;
            let start = Instant::now();
            let mut score = fitness::FitnessVector::ZERO;
            for _ in 0..iterations {
                score = fitness::evaluate(&labeling, &measurements)?;
            }
            let elapsed = start.elapsed();

            Ok(merge(
                timing_metrics(iterations, elapsed),
                json!({
                    "measurements": measurements.len(),
                    "fitness": score.components(),
                }),
            ))
        })
        .await?;

        Ok(BenchmarkResult::new(self.id(), metrics))
    }
}

/// A short evolutionary search
#[derive(Debug, Clone)]
pub struct ParameterSearchTarget {
    config: BenchConfig,
    search: SearchConfig,
}

impl ParameterSearchTarget {
    pub fn new(config: BenchConfig) -> Self {
        Self {
            config,
            search: SearchConfig {
                population_size: 20,
                generations: 3,
                seed: Some(config.seed),
                ..SearchConfig::default()
            },
        }
    }

    pub fn with_search(config: BenchConfig, search: SearchConfig) -> Self {
        Self { config, search }
    }
}

#[async_trait]
impl BenchTarget for ParameterSearchTarget {
    fn id(&self) -> &str {
        "parameter_search"
    }

    fn description(&self) -> &str {
        "Runs a seeded genetic parameter search end to end"
    }

    async fn run(&self) -> anyhow::Result<BenchmarkResult> {
        let config = self.config;
        let search_config = self.search.clone();
        let metrics = blocking(move || {
            let (matrix, measurements) = build_matrix(&config);
            let search = ParameterSearch::dbscan(matrix, measurements.clone(), search_config)?;

            let start = Instant::now();
            let outcome = search.run()?;
            let elapsed = start.elapsed();

            let evaluations = outcome.evaluations().max(1);
            let best = outcome.best().map(|b| b.fitness_or_zero().components());
            Ok(merge(
                timing_metrics(evaluations, elapsed),
                json!({
                    "measurements": measurements.len(),
                    "generations": outcome.history.len().saturating_sub(1),
                    "evaluations": outcome.evaluations(),
                    "failed_evaluations": outcome.failures(),
                    "best_fitness": best,
                    "seed": outcome.seed,
                }),
            ))
        })
        .await?;

        Ok(BenchmarkResult::new(self.id(), metrics))
    }
}
