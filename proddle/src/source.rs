//! Measurement file loading.
//!
//! Accepts either a JSON array of measurement documents or one document per
//! line (the format `mongoexport` writes). `-` reads from stdin.

use anyhow::{Context, Result};
use proddle_core::{Measurement, RawMeasurement};
use std::io::Read;
use std::path::Path;
use tracing::info;

pub(crate) fn parse_documents(content: &str) -> Result<Vec<RawMeasurement>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("Failed to parse measurement array");
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Failed to parse measurement on line {}", n + 1))
        })
        .collect()
}

/// Read and validate every measurement in `path`
pub(crate) fn load_measurements(path: &Path) -> Result<Vec<Measurement>> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read measurements from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read measurements from {}", path.display()))?
    };

    let raw = parse_documents(&content)?;
    let measurements = Measurement::try_from_raw_batch(raw).context("Invalid measurement")?;

    info!(
        path = %path.display(),
        measurements = measurements.len(),
        failures = measurements.iter().filter(|m| m.has_error).count(),
        "Measurements loaded"
    );
    Ok(measurements)
}
