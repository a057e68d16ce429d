//! Benchmark result store.
//!
//! ```text
//! <output>/raw/<target>_<timestamp>.json   one file per target run
//! <output>/summary.md                      table for the latest run
//! ```
//!
//! Earlier runs stay in `raw/` so a new run can be compared against the
//! most recent one of each target.

use crate::result::BenchmarkResult;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default output directory, relative to the working directory
pub const DEFAULT_OUTPUT_DIR: &str = "benchmarks/output";

/// Summary markdown file name
pub const SUMMARY_FILE: &str = "summary.md";

/// Reads and writes benchmark runs under one output directory.
#[derive(Debug, Clone)]
pub struct BenchmarkIO {
    output_dir: PathBuf,
    raw_dir: PathBuf,
}

impl Default for BenchmarkIO {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_DIR)
    }
}

impl BenchmarkIO {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        let output_dir = output_dir.as_ref().to_path_buf();
        let raw_dir = output_dir.join("raw");
        Self { output_dir, raw_dir }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(SUMMARY_FILE)
    }

    /// `<target>_<UTC timestamp with milliseconds>.json`
    fn file_name(result: &BenchmarkResult) -> String {
        format!(
            "{}_{}.json",
            result.target_id,
            result.timestamp.format("%Y%m%d_%H%M%S%3f")
        )
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        fs::create_dir_all(&self.raw_dir)
            .with_context(|| format!("cannot create benchmark directory {}", self.raw_dir.display()))?;
        fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))
    }

    /// Store one target run under `raw/`
    pub fn write_result(&self, result: &BenchmarkResult) -> Result<PathBuf> {
        let path = self.raw_dir.join(Self::file_name(result));
        self.write_file(&path, &result.to_json()?)?;
        debug!(target = %result.target_id, path = %path.display(), "Stored benchmark run");
        Ok(path)
    }

    pub fn write_results(&self, results: &[BenchmarkResult]) -> Result<Vec<PathBuf>> {
        results.iter().map(|r| self.write_result(r)).collect()
    }

    pub fn read_result(&self, path: impl AsRef<Path>) -> Result<BenchmarkResult> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        BenchmarkResult::from_json(&content)
            .with_context(|| format!("{} is not a benchmark result", path.display()))
    }

    /// Every stored run, newest first. Files that do not parse are skipped.
    pub fn read_all_results(&self) -> Result<Vec<BenchmarkResult>> {
        if !self.raw_dir.exists() {
            return Ok(Vec::new());
        }

        let mut results: Vec<BenchmarkResult> = fs::read_dir(&self.raw_dir)
            .with_context(|| format!("cannot list {}", self.raw_dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
            .filter_map(|path| match self.read_result(&path) {
                Ok(result) => Some(result),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Ignoring stored file");
                    None
                }
            })
            .collect();

        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(results)
    }

    /// Most recent stored run of each target, ordered by target id
    pub fn latest_per_target(&self) -> Result<Vec<BenchmarkResult>> {
        let mut latest: HashMap<String, BenchmarkResult> = HashMap::new();
        for result in self.read_all_results()? {
            latest.entry(result.target_id.clone()).or_insert(result);
        }

        let mut latest: Vec<BenchmarkResult> = latest.into_values().collect();
        latest.sort_by(|a, b| a.target_id.cmp(&b.target_id));
        Ok(latest)
    }

    pub fn write_summary(&self, content: &str) -> Result<PathBuf> {
        let path = self.summary_path();
        self.write_file(&path, content)?;
        info!(path = %path.display(), "Benchmark summary written");
        Ok(path)
    }
}
