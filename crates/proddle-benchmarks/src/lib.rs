//! # Proddle Benchmarks
//!
//! Timing harness for the failure-event analysis pipeline.
//!
//! - [`BenchTarget`]: one benchmarkable stage (matrix build, DBSCAN,
//!   fitness scoring, parameter search)
//! - [`run_all_benchmarks`] / [`run_all_benchmarks_parallel`]: run every
//!   target and collect [`BenchmarkResult`]s
//! - [`BenchmarkIO`]: JSON results under `benchmarks/output/raw/` and a
//!   markdown summary in `benchmarks/output/summary.md`
//!
//! ```rust,ignore
//! use proddle_benchmarks::{run_and_save_benchmarks, BenchConfig, BenchmarkIO};
//!
//! let (results, summary) =
//!     run_and_save_benchmarks(BenchConfig::default(), &BenchmarkIO::default()).await?;
//! ```

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

mod adapters;
mod io;
mod markdown;
mod result;

pub use adapters::{
    all_targets, BenchConfig, BenchTarget, DbscanTarget, FitnessTarget, MatrixBuildTarget,
    ParameterSearchTarget,
};
pub use io::{BenchmarkIO, DEFAULT_OUTPUT_DIR, SUMMARY_FILE};
pub use markdown::{generate_comparison, generate_summary};
pub use result::BenchmarkResult;

use std::path::PathBuf;
use tracing::{debug, error, info};

/// Run every target one after another.
///
/// A failing target is logged and skipped; the others still run.
pub async fn run_all_benchmarks(config: BenchConfig) -> Vec<BenchmarkResult> {
    let targets = all_targets(config);
    info!(
        targets = targets.len(),
        measurements = config.measurements,
        iterations = config.iterations,
        "Starting benchmark execution"
    );

    let mut results = Vec::with_capacity(targets.len());
    for target in &targets {
        debug!(target = target.id(), "Running benchmark");
        match target.run().await {
            Ok(result) => {
                info!(target = target.id(), avg_us = ?result.avg_duration_us(), "Benchmark complete");
                results.push(result);
            }
            Err(e) => error!(target = target.id(), error = %e, "Benchmark failed"),
        }
    }

    info!(
        succeeded = results.len(),
        total = targets.len(),
        "Benchmark execution complete"
    );
    results
}

/// Run every target concurrently.
///
/// Targets compete for cores, so timings are noisier than with
/// [`run_all_benchmarks`].
pub async fn run_all_benchmarks_parallel(config: BenchConfig) -> Vec<BenchmarkResult> {
    let targets = all_targets(config);
    info!(targets = targets.len(), "Starting parallel benchmark execution");

    let handles: Vec<_> = targets
        .into_iter()
        .map(|target| {
            tokio::spawn(async move {
                match target.run().await {
                    Ok(result) => Some(result),
                    Err(e) => {
                        error!(target = target.id(), error = %e, "Benchmark failed");
                        None
                    }
                }
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(Some(result)) => results.push(result),
            Ok(None) => {}
            Err(e) => error!(error = %e, "Benchmark task join error"),
        }
    }

    info!(succeeded = results.len(), "Parallel benchmark execution complete");
    results
}

/// Run every target, write the results and a summary.
///
/// Returns the results and the summary path.
pub async fn run_and_save_benchmarks(
    config: BenchConfig,
    io: &BenchmarkIO,
) -> anyhow::Result<(Vec<BenchmarkResult>, PathBuf)> {
    let results = run_all_benchmarks(config).await;
    io.write_results(&results)?;
    let summary_path = io.write_summary(&generate_summary(&results))?;
    Ok((results, summary_path))
}
