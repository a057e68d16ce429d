//! Markdown rendering of benchmark results.

use crate::result::BenchmarkResult;
use std::collections::BTreeMap;
use std::fmt::Write;

fn format_us(us: Option<f64>) -> String {
    match us {
        Some(us) if us >= 1_000_000.0 => format!("{:.2} s", us / 1_000_000.0),
        Some(us) if us >= 1_000.0 => format!("{:.2} ms", us / 1_000.0),
        Some(us) => format!("{:.1} µs", us),
        None => "-".to_string(),
    }
}

fn format_count(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{}", v as u64))
}

/// Summary table, one row per result, ordered by target id
pub fn generate_summary(results: &[BenchmarkResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Proddle Benchmark Summary\n");
    let _ = writeln!(
        out,
        "Generated {}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );

    if results.is_empty() {
        let _ = writeln!(out, "_No benchmark results._");
        return out;
    }

    let mut sorted: Vec<&BenchmarkResult> = results.iter().collect();
    sorted.sort_by(|a, b| a.target_id.cmp(&b.target_id));

    let _ = writeln!(out, "| Target | Measurements | Iterations | Avg / iteration | Total |");
    let _ = writeln!(out, "|--------|-------------:|-----------:|----------------:|------:|");
    for result in sorted {
        let _ = writeln!(
            out,
            "| `{}` | {} | {} | {} | {} |",
            result.target_id,
            format_count(result.metric_f64("measurements")),
            format_count(result.metric_f64("iterations")),
            format_us(result.avg_duration_us()),
            format_us(result.metric_f64("total_duration_ms").map(|ms| ms * 1_000.0)),
        );
    }

    out
}

/// Per-target change in average iteration time between two runs.
///
/// Targets present in only one run are listed with a dash.
pub fn generate_comparison(baseline: &[BenchmarkResult], current: &[BenchmarkResult]) -> String {
    let mut rows: BTreeMap<&str, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for result in baseline {
        rows.entry(result.target_id()).or_default().0 = result.avg_duration_us();
    }
    for result in current {
        rows.entry(result.target_id()).or_default().1 = result.avg_duration_us();
    }

    let mut out = String::new();
    let _ = writeln!(out, "# Proddle Benchmark Comparison\n");
    let _ = writeln!(out, "| Target | Baseline | Current | Change |");
    let _ = writeln!(out, "|--------|---------:|--------:|-------:|");
    for (target, (before, after)) in rows {
        let change = match (before, after) {
            (Some(b), Some(a)) if b > 0.0 => format!("{:+.1}%", (a - b) / b * 100.0),
            _ => "-".to_string(),
        };
        let _ = writeln!(
            out,
            "| `{}` | {} | {} | {} |",
            target,
            format_us(before),
            format_us(after),
            change
        );
    }
    out
}
