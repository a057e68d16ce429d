//! Configuration for an analysis run.
//!
//! Configuration is resolved in order:
//! 1. built-in defaults (the tuning used for the April 2017 measurement set)
//! 2. a TOML file (`config/proddle.toml` by default, optional)
//! 3. environment variables with the `PRODDLE_` prefix
//! 4. command-line flags, applied by the binary

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "PRODDLE_";

/// Top-level analysis configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub distance: DistanceConfig,
    pub clustering: ClusteringConfig,
    pub search: SearchConfig,
    pub filter: FilterConfig,
}

/// Distance function settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    /// Time difference (hours) at which same-domain distance saturates
    pub cap_hours: f64,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self { cap_hours: 8.0 }
    }
}

/// Distance matrix / clusterer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Input size above which the O(n²) matrix build is logged as a scaling risk
    pub matrix_warn_threshold: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            matrix_warn_threshold: 20_000,
        }
    }
}

/// How fitness vectors are ordered during selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    /// Compare weighted components in order; later components break ties
    #[default]
    Lexicographic,
    /// Compare the weighted sum of components
    WeightedSum,
    /// Non-dominated front first, ties broken by weighted sum
    Pareto,
}

impl FromStr for RankingStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "lexicographic" => Ok(RankingStrategy::Lexicographic),
            "weighted_sum" => Ok(RankingStrategy::WeightedSum),
            "pareto" => Ok(RankingStrategy::Pareto),
            other => Err(Error::config(format!(
                "unknown ranking strategy '{}' (expected lexicographic, weighted_sum or pareto)",
                other
            ))),
        }
    }
}

/// Evolutionary parameter search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Individuals per generation
    pub population_size: usize,
    /// Number of evolve-evaluate cycles after the initial evaluation
    pub generations: usize,
    /// Probability that a consecutive pair is recombined
    pub crossover_probability: f64,
    /// Probability that an individual is mutated
    pub mutation_probability: f64,
    /// Per-gene mutation probability for a mutated individual
    pub gene_mutation_probability: f64,
    /// Mean of the additive Gaussian mutation
    pub mutation_mean: f64,
    /// Standard deviation of the additive Gaussian mutation
    pub mutation_std_dev: f64,
    /// Individuals sampled per tournament
    pub tournament_size: usize,
    /// radius = |x0| * radius_scale
    pub radius_scale: f64,
    /// min_size = ceil(|x1| * min_size_scale)
    pub min_size_scale: f64,
    /// Best individuals copied unchanged into the next generation
    pub elite_count: usize,
    /// Best-ever individuals retained across the run
    pub hall_of_fame_size: usize,
    /// Fitness ordering used by selection
    pub ranking: RankingStrategy,
    /// Weights of (vantage breadth, constant, failure density)
    pub fitness_weights: [f64; 3],
    /// RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
    /// Evaluation worker threads; `None` uses one per core
    pub worker_threads: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 3,
            crossover_probability: 0.5,
            mutation_probability: 0.2,
            gene_mutation_probability: 0.2,
            mutation_mean: 0.0,
            mutation_std_dev: 1.0,
            tournament_size: 3,
            radius_scale: 100.0,
            min_size_scale: 5.0,
            elite_count: 0,
            hall_of_fame_size: 5,
            ranking: RankingStrategy::default(),
            fitness_weights: [1.0, 1.0, 1.0],
            seed: None,
            worker_threads: None,
        }
    }
}

impl SearchConfig {
    /// Reject search settings the optimizer cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.population_size < 2 {
            return Err(Error::config("search.population_size must be at least 2"));
        }
        if self.tournament_size == 0 {
            return Err(Error::config("search.tournament_size must be at least 1"));
        }
        for (name, p) in [
            ("crossover_probability", self.crossover_probability),
            ("mutation_probability", self.mutation_probability),
            ("gene_mutation_probability", self.gene_mutation_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::config(format!(
                    "search.{} must be between 0.0 and 1.0, got {}",
                    name, p
                )));
            }
        }
        if !(self.mutation_std_dev.is_finite() && self.mutation_std_dev >= 0.0) {
            return Err(Error::config("search.mutation_std_dev must be non-negative"));
        }
        if !self.mutation_mean.is_finite() {
            return Err(Error::config("search.mutation_mean must be finite"));
        }
        if !(self.radius_scale.is_finite() && self.radius_scale > 0.0) {
            return Err(Error::config("search.radius_scale must be greater than 0"));
        }
        if !(self.min_size_scale.is_finite() && self.min_size_scale > 0.0) {
            return Err(Error::config("search.min_size_scale must be greater than 0"));
        }
        if self.elite_count >= self.population_size {
            return Err(Error::config(
                "search.elite_count must be smaller than population_size",
            ));
        }
        if self.fitness_weights.iter().any(|w| !(w.is_finite() && *w > 0.0)) {
            return Err(Error::config(
                "search.fitness_weights must all be positive (every component is maximized)",
            ));
        }
        if self.worker_threads == Some(0) {
            return Err(Error::config("search.worker_threads must be at least 1"));
        }

        Ok(())
    }
}

/// Pre-clustering measurement filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Drop successful measurements before clustering
    pub failures_only: bool,
    /// Domains removed before clustering (chronically failing targets)
    pub exclude_domains: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            failures_only: true,
            exclude_domains: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file.
    ///
    /// The result is not validated: later layers may still correct it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: AnalysisConfig = toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Load from `path` if it exists, fall back to defaults, then apply
    /// environment overrides.
    ///
    /// Call [`validate`](Self::validate) once every layer has been applied.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`load`](Self::load) with an arbitrary override lookup
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if path.exists() {
            info!(path = %path.display(), "Loading analysis configuration");
            Self::from_file(path)?
        } else {
            debug!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        config.apply_overrides_from(lookup)?;
        Ok(config)
    }

    /// Apply `PRODDLE_*` overrides from a key lookup (the environment in
    /// [`load`](Self::load))
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(v) = parse_override::<f64>(&get, "DISTANCE_CAP_HOURS")? {
            self.distance.cap_hours = v;
        }
        if let Some(v) = parse_override::<usize>(&get, "MATRIX_WARN_THRESHOLD")? {
            self.clustering.matrix_warn_threshold = v;
        }
        if let Some(v) = parse_override::<usize>(&get, "POPULATION_SIZE")? {
            self.search.population_size = v;
        }
        if let Some(v) = parse_override::<usize>(&get, "GENERATIONS")? {
            self.search.generations = v;
        }
        if let Some(v) = parse_override::<f64>(&get, "CROSSOVER_PROBABILITY")? {
            self.search.crossover_probability = v;
        }
        if let Some(v) = parse_override::<f64>(&get, "MUTATION_PROBABILITY")? {
            self.search.mutation_probability = v;
        }
        if let Some(v) = parse_override::<f64>(&get, "GENE_MUTATION_PROBABILITY")? {
            self.search.gene_mutation_probability = v;
        }
        if let Some(v) = parse_override::<f64>(&get, "MUTATION_STD_DEV")? {
            self.search.mutation_std_dev = v;
        }
        if let Some(v) = parse_override::<usize>(&get, "TOURNAMENT_SIZE")? {
            self.search.tournament_size = v;
        }
        if let Some(v) = parse_override::<f64>(&get, "RADIUS_SCALE")? {
            self.search.radius_scale = v;
        }
        if let Some(v) = parse_override::<f64>(&get, "MIN_SIZE_SCALE")? {
            self.search.min_size_scale = v;
        }
        if let Some(v) = parse_override::<usize>(&get, "ELITE_COUNT")? {
            self.search.elite_count = v;
        }
        if let Some(v) = parse_override::<RankingStrategy>(&get, "RANKING")? {
            self.search.ranking = v;
        }
        if let Some(v) = parse_override::<u64>(&get, "SEED")? {
            self.search.seed = Some(v);
        }
        if let Some(v) = parse_override::<usize>(&get, "WORKER_THREADS")? {
            self.search.worker_threads = Some(v);
        }
        if let Some(v) = parse_override::<bool>(&get, "FAILURES_ONLY")? {
            self.filter.failures_only = v;
        }
        if let Some(v) = get("EXCLUDE_DOMAINS") {
            self.filter.exclude_domains = v
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.distance.cap_hours.is_finite() && self.distance.cap_hours > 0.0) {
            return Err(Error::config("distance.cap_hours must be greater than 0"));
        }

        self.search.validate()
    }
}

fn parse_override<T>(get: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            Error::config(format!(
                "Invalid value for {}{}: {} ({})",
                ENV_PREFIX, name, raw, e
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_tuning() {
        let config = AnalysisConfig::default();
        assert_eq!(config.distance.cap_hours, 8.0);
        assert_eq!(config.search.population_size, 50);
        assert_eq!(config.search.generations, 3);
        assert_eq!(config.search.crossover_probability, 0.5);
        assert_eq!(config.search.mutation_probability, 0.2);
        assert_eq!(config.search.gene_mutation_probability, 0.2);
        assert_eq!(config.search.mutation_std_dev, 1.0);
        assert_eq!(config.search.tournament_size, 3);
        assert_eq!(config.search.radius_scale, 100.0);
        assert_eq!(config.search.min_size_scale, 5.0);
        assert!(config.filter.failures_only);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[distance]\ncap_hours = 4.0\n\n[search]\ngenerations = 10\nranking = \"pareto\"\nseed = 7"
        )
        .unwrap();

        let config = AnalysisConfig::from_file(file.path()).unwrap();
        assert_eq!(config.distance.cap_hours, 4.0);
        assert_eq!(config.search.generations, 10);
        assert_eq!(config.search.ranking, RankingStrategy::Pareto);
        assert_eq!(config.search.seed, Some(7));
        // untouched sections keep their defaults
        assert_eq!(config.search.population_size, 50);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let shipped: AnalysisConfig =
            toml::from_str(include_str!("../../../config/proddle.toml")).unwrap();
        assert_eq!(shipped, AnalysisConfig::default());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.search.tournament_size, 3);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PRODDLE_POPULATION_SIZE", "20"),
            ("PRODDLE_SEED", "42"),
            ("PRODDLE_RANKING", "weighted-sum"),
            ("PRODDLE_EXCLUDE_DOMAINS", "a.com, b.com,"),
            ("PRODDLE_FAILURES_ONLY", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = AnalysisConfig::default();
        config
            .apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.search.population_size, 20);
        assert_eq!(config.search.seed, Some(42));
        assert_eq!(config.search.ranking, RankingStrategy::WeightedSum);
        assert_eq!(config.filter.exclude_domains, vec!["a.com", "b.com"]);
        assert!(!config.filter.failures_only);
    }

    #[test]
    fn test_environment_corrects_file_value() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\npopulation_size = 1\nelite_count = 60").unwrap();

        let config = AnalysisConfig::load_with(file.path(), |k| match k {
            "PRODDLE_POPULATION_SIZE" => Some("100".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.search.population_size, 100);
        assert_eq!(config.search.elite_count, 60);
        assert!(config.validate().is_ok());

        // the file alone loads but does not validate
        let raw = AnalysisConfig::from_file(file.path()).unwrap();
        assert!(raw.validate().is_err());
    }

    #[test]
    fn test_failures_only_must_be_a_bool() {
        for bad in ["TRUE", "yes", "1"] {
            let mut config = AnalysisConfig::default();
            let err = config
                .apply_overrides_from(|k| (k == "PRODDLE_FAILURES_ONLY").then(|| bad.to_string()))
                .unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{} accepted", bad);
        }

        let mut config = AnalysisConfig::default();
        config
            .apply_overrides_from(|k| (k == "PRODDLE_FAILURES_ONLY").then(|| " false ".to_string()))
            .unwrap();
        assert!(!config.filter.failures_only);
    }

    #[test]
    fn test_invalid_override_is_config_error() {
        let mut config = AnalysisConfig::default();
        let err = config
            .apply_overrides_from(|k| (k == "PRODDLE_GENERATIONS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AnalysisConfig::default();
        config.search.crossover_probability = 1.5;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.search.fitness_weights = [1.0, 0.0, 1.0];
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.search.elite_count = 50;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.distance.cap_hours = 0.0;
        assert!(config.validate().is_err());
    }
}
