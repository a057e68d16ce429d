//! Proddle failure-event analysis CLI
//!
//! - `cluster`: group failures into events with fixed parameters
//! - `optimize`: tune the clustering parameters with a genetic search, then
//!   report the events found with the best candidate
//! - `k-distance`: print the k-nearest distance profile used to pick a radius
//! - `bench`: run the benchmark targets

mod source;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use proddle_benchmarks::{
    generate_comparison, generate_summary, run_all_benchmarks, run_all_benchmarks_parallel,
    BenchConfig, BenchmarkIO,
};
use proddle_core::{config::RankingStrategy, AnalysisConfig};
use proddle_detection::{ClusterParams, CorrelationReport, FailureEventCorrelator};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Proddle CLI arguments
#[derive(Debug, Parser)]
#[clap(
    name = "proddle",
    version,
    about = "Correlate probe failures into failure events"
)]
struct Cli {
    /// Configuration file path
    #[clap(short, long, default_value = "config/proddle.toml", global = true)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[clap(long, env = "PRODDLE_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[clap(long, env = "PRODDLE_LOG_JSON", global = true)]
    log_json: bool,

    /// Hours after which same-domain distance saturates
    #[clap(long, global = true)]
    cap_hours: Option<f64>,

    /// Keep successful measurements instead of clustering failures only
    #[clap(long, global = true)]
    include_successes: bool,

    /// Domain to drop before clustering (repeatable)
    #[clap(long = "exclude-domain", global = true)]
    exclude_domains: Vec<String>,

    #[clap(subcommand)]
    command: Commands,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Cluster measurements with fixed parameters
    Cluster {
        /// Measurement file (JSON array or JSON lines, `-` for stdin)
        #[clap(short, long)]
        input: PathBuf,

        /// Neighborhood radius in distance units (100 = cap)
        #[clap(long)]
        radius: f64,

        /// Neighbors within the radius that make a core point
        #[clap(long)]
        min_size: usize,

        #[clap(flatten)]
        output: OutputArgs,
    },
    /// Tune clustering parameters, then cluster with the best found
    Optimize {
        /// Measurement file (JSON array or JSON lines, `-` for stdin)
        #[clap(short, long)]
        input: PathBuf,

        #[clap(long)]
        population: Option<usize>,

        #[clap(long)]
        generations: Option<usize>,

        /// RNG seed; a random seed is chosen and reported when absent
        #[clap(long)]
        seed: Option<u64>,

        /// Evaluation threads (defaults to all cores)
        #[clap(long)]
        workers: Option<usize>,

        /// Fitness ranking: lexicographic, weighted-sum or pareto
        #[clap(long)]
        ranking: Option<RankingStrategy>,

        /// Individuals carried unchanged into each generation
        #[clap(long)]
        elite: Option<usize>,

        #[clap(flatten)]
        output: OutputArgs,
    },
    /// Print the pooled k-nearest distance profile in hours
    KDistance {
        /// Measurement file (JSON array or JSON lines, `-` for stdin)
        #[clap(short, long)]
        input: PathBuf,

        /// Neighbors per measurement
        #[clap(short, long, default_value = "4")]
        k: usize,

        /// Print every value as JSON instead of quantiles
        #[clap(long)]
        json: bool,
    },
    /// Run benchmarks and write results to the output directory
    Bench {
        /// Run targets concurrently
        #[clap(long)]
        parallel: bool,

        #[clap(long, default_value = "benchmarks/output")]
        output: PathBuf,

        /// Synthetic batch size
        #[clap(long, default_value = "400")]
        measurements: usize,

        #[clap(long, default_value = "10")]
        iterations: usize,

        /// Only print results, don't write files
        #[clap(long)]
        dry_run: bool,

        /// Print results as JSON
        #[clap(long)]
        json: bool,
    },
}

#[derive(Debug, clap::Args)]
struct OutputArgs {
    /// Write the full report as JSON to this file
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Print the full report as JSON instead of a summary
    #[clap(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting proddle");

    match &cli.command {
        Commands::Cluster {
            input,
            radius,
            min_size,
            output,
        } => {
            let config = load_config(&cli, |_| {})?;
            let params = ClusterParams::new(*radius, *min_size)?;
            let measurements = source::load_measurements(input)?;

            let correlator = FailureEventCorrelator::new(config)?;
            let report = correlator.correlate(measurements, params).await?;
            emit_report(&report, output)
        }
        Commands::Optimize {
            input,
            population,
            generations,
            seed,
            workers,
            ranking,
            elite,
            output,
        } => {
            let config = load_config(&cli, |config| {
                let search = &mut config.search;
                if let Some(v) = population {
                    search.population_size = *v;
                }
                if let Some(v) = generations {
                    search.generations = *v;
                }
                if seed.is_some() {
                    search.seed = *seed;
                }
                if workers.is_some() {
                    search.worker_threads = *workers;
                }
                if let Some(v) = ranking {
                    search.ranking = *v;
                }
                if let Some(v) = elite {
                    search.elite_count = *v;
                }
            })?;
            let measurements = source::load_measurements(input)?;

            let correlator = FailureEventCorrelator::new(config)?;
            let report = correlator.optimize(measurements).await?;
            emit_report(&report, output)
        }
        Commands::KDistance { input, k, json } => {
            let config = load_config(&cli, |_| {})?;
            let measurements = source::load_measurements(input)?;

            let correlator = FailureEventCorrelator::new(config)?;
            let batch = correlator.prepare(measurements);
            let profile = correlator.k_distance_hours(&batch, *k);

            if *json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                print_quantiles(&profile, *k);
            }
            Ok(())
        }
        Commands::Bench {
            parallel,
            output,
            measurements,
            iterations,
            dry_run,
            json,
        } => {
            let config = BenchConfig {
                measurements: *measurements,
                iterations: *iterations,
                ..BenchConfig::default()
            };
            run_benchmarks_command(config, *parallel, output, *dry_run, *json).await
        }
    }
}

/// Load file and environment configuration, then apply flags
fn load_config(cli: &Cli, apply: impl FnOnce(&mut AnalysisConfig)) -> Result<AnalysisConfig> {
    let mut config = AnalysisConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    if let Some(cap) = cli.cap_hours {
        config.distance.cap_hours = cap;
    }
    if cli.include_successes {
        config.filter.failures_only = false;
    }
    config
        .filter
        .exclude_domains
        .extend(cli.exclude_domains.iter().cloned());
    apply(&mut config);

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn emit_report(report: &CorrelationReport, output: &OutputArgs) -> Result<()> {
    if let Some(path) = &output.output {
        report
            .write_to(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Report written");
    }

    if output.json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    println!("Run:          {}", report.run_id);
    println!("Measurements: {}", report.measurement_count);
    println!("Parameters:   {}", report.params);
    println!("Fitness:      {}", report.fitness);
    println!("Noise:        {}", report.noise_count);
    if let Some(search) = &report.search {
        println!(
            "Search:       seed {} | {} generations | {} evaluations ({} failed) | {} ms",
            search.seed,
            search.generations,
            search.evaluations,
            search.failed_evaluations,
            search.elapsed_ms
        );
    }
    println!();
    println!("{} failure event(s)", report.event_count());
    for event in &report.events {
        println!(
            "  #{:<3} {} .. {}  {:>4} failures  {:>3} vantages  {}{}",
            event.label,
            event.first_seen.format("%Y-%m-%d %H:%M:%S"),
            event.last_seen.format("%H:%M:%S"),
            event.member_count(),
            event.vantage_count(),
            event.domains.join(","),
            event
                .dominant_error_code()
                .map(|c| format!("  [{}]", c))
                .unwrap_or_default()
        );
    }
    Ok(())
}

fn print_quantiles(profile: &[f64], k: usize) {
    if profile.is_empty() {
        println!("No distances (fewer than two measurements)");
        return;
    }
    println!("{}-distance profile over {} values (hours)", k, profile.len());
    for q in [0.0, 0.1, 0.25, 0.5, 0.75, 0.9, 0.95, 1.0] {
        let idx = ((profile.len() - 1) as f64 * q).round() as usize;
        println!("  p{:<3} {:>8.3}", (q * 100.0) as u32, profile[idx]);
    }
}

async fn run_benchmarks_command(
    config: BenchConfig,
    parallel: bool,
    output: &Path,
    dry_run: bool,
    json_output: bool,
) -> Result<()> {
    let results = if parallel {
        run_all_benchmarks_parallel(config).await
    } else {
        run_all_benchmarks(config).await
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!("{}", generate_summary(&results));
    }

    if dry_run {
        info!("Dry run, results not written");
        return Ok(());
    }

    let io = BenchmarkIO::new(output);
    let baseline = io.latest_per_target()?;
    if !baseline.is_empty() && !json_output {
        println!("{}", generate_comparison(&baseline, &results));
    }
    io.write_results(&results)?;
    let summary_path = io.write_summary(&generate_summary(&results))?;
    info!(summary = %summary_path.display(), "Benchmark results written");
    Ok(())
}

/// Initialize logging
fn init_logging(cli: &Cli) -> Result<()> {
    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .context("Invalid log level")?;

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into());

    // logs go to stderr so reports on stdout stay machine readable
    if cli.log_json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true),
            )
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .with(filter)
            .init();
    }

    Ok(())
}
