//! Evolutionary search over clustering parameters.
//!
//! A population of two-gene individuals is evolved for a fixed number of
//! generations. Each generation:
//!
//! 1. the best `elite_count` individuals are carried over unchanged
//! 2. the rest are chosen by tournament selection
//! 3. consecutive pairs are recombined with two-point crossover
//! 4. each offspring may receive Gaussian mutation
//! 5. every individual whose genes changed is re-evaluated
//!
//! Evaluation clusters the shared distance matrix with the decoded
//! parameters and scores the labeling. Evaluations run in parallel; all of
//! them finish before selection for the next generation starts. A failed
//! evaluation is logged and scored [`FitnessVector::ZERO`], it never aborts
//! the run.

pub mod encoding;
pub mod operators;
pub mod ranking;
pub mod stats;

pub use encoding::{Genome, ParameterEncoding, GENOME_LEN};
pub use ranking::{FitnessRanking, RankKey};
pub use stats::{GenerationStats, HallOfFame};

use crate::clustering::{ClusterParams, Clusterer, Dbscan};
use crate::fitness::{self, FitnessVector};
use crate::matrix::DistanceMatrix;
use operators::{crossover_two_point, mutate_gaussian, select_tournament};
use proddle_core::{config::SearchConfig, Error, Measurement, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use ranking::compare_keys;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One candidate parameter set and its evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub genes: Genome,
    /// Decoded parameters; `None` until evaluated or when decoding failed
    pub params: Option<ClusterParams>,
    /// `None` means the individual must be (re-)evaluated
    pub fitness: Option<FitnessVector>,
    /// Why the last evaluation failed
    pub error: Option<String>,
}

impl Individual {
    /// Unevaluated individual
    pub fn new(genes: Genome) -> Self {
        Self {
            genes,
            params: None,
            fitness: None,
            error: None,
        }
    }

    /// Fitness, treating an unevaluated individual as zero
    pub fn fitness_or_zero(&self) -> FitnessVector {
        self.fitness.unwrap_or(FitnessVector::ZERO)
    }

    /// Whether the last evaluation failed
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    fn invalidate(&mut self) {
        self.params = None;
        self.fitness = None;
        self.error = None;
    }
}

/// Result of a completed search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Final population, evaluated
    pub population: Vec<Individual>,
    pub hall_of_fame: HallOfFame,
    /// One entry per generation, the initial population first
    pub history: Vec<GenerationStats>,
    /// Seed that reproduces this run
    pub seed: u64,
    pub ranking: FitnessRanking,
    pub elapsed_ms: u64,
}

impl SearchOutcome {
    /// Best individual seen during the run
    pub fn best(&self) -> Option<&Individual> {
        self.hall_of_fame.best().or_else(|| {
            self.population
                .iter()
                .filter(|i| i.fitness.is_some())
                .max_by(|a, b| self.ranking.compare(&a.fitness_or_zero(), &b.fitness_or_zero()))
        })
    }

    /// Total evaluations across all generations
    pub fn evaluations(&self) -> usize {
        self.history.iter().map(|s| s.evaluations).sum()
    }

    /// Total failed evaluations across all generations
    pub fn failures(&self) -> usize {
        self.history.iter().map(|s| s.failures).sum()
    }
}

/// Genetic search for the clustering parameters with the best fitness.
///
/// The distance matrix and measurements are shared read-only by every
/// evaluation; nothing is rebuilt per candidate.
#[derive(Debug)]
pub struct ParameterSearch<C: Clusterer = Dbscan> {
    matrix: Arc<DistanceMatrix>,
    measurements: Arc<[Measurement]>,
    clusterer: C,
    config: SearchConfig,
    encoding: ParameterEncoding,
    ranking: FitnessRanking,
    pool: Option<rayon::ThreadPool>,
}

impl ParameterSearch<Dbscan> {
    /// Search with the density clusterer
    pub fn dbscan(
        matrix: Arc<DistanceMatrix>,
        measurements: Arc<[Measurement]>,
        config: SearchConfig,
    ) -> Result<Self> {
        Self::new(matrix, measurements, Dbscan::new(), config)
    }
}

impl<C: Clusterer> ParameterSearch<C> {
    /// Create a search over a prebuilt matrix.
    ///
    /// Fails if the configuration is invalid or the matrix does not cover
    /// exactly the given measurements.
    pub fn new(
        matrix: Arc<DistanceMatrix>,
        measurements: Arc<[Measurement]>,
        clusterer: C,
        config: SearchConfig,
    ) -> Result<Self> {
        config.validate()?;

        if matrix.len() != measurements.len() {
            return Err(Error::validation(format!(
                "distance matrix covers {} measurements but {} were supplied",
                matrix.len(),
                measurements.len()
            )));
        }

        let pool = match config.worker_threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("proddle-eval-{}", i))
                    .build()
                    .map_err(|e| Error::internal(format!("failed to build worker pool: {}", e)))?,
            ),
            None => None,
        };

        Ok(Self {
            encoding: ParameterEncoding::from_config(&config),
            ranking: FitnessRanking::from_config(&config),
            matrix,
            measurements,
            clusterer,
            config,
            pool,
        })
    }

    /// Search configuration
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Gene mapping in use
    pub fn encoding(&self) -> &ParameterEncoding {
        &self.encoding
    }

    /// Fitness ordering in use
    pub fn ranking(&self) -> &FitnessRanking {
        &self.ranking
    }

    /// Decode, cluster and score one genome
    pub fn evaluate_candidate(&self, genes: &Genome) -> Result<(ClusterParams, FitnessVector)> {
        let params = self.encoding.decode(genes)?;
        let labeling = self.clusterer.cluster(&self.matrix, params)?;
        let fitness = fitness::evaluate(&labeling, &self.measurements)?;
        Ok((params, fitness))
    }

    /// Evaluate in place; returns whether the evaluation failed
    fn evaluate_individual(&self, individual: &mut Individual) -> bool {
        match self.evaluate_candidate(&individual.genes) {
            Ok((params, fitness)) => {
                individual.params = Some(params);
                individual.fitness = Some(fitness);
                individual.error = None;
                false
            }
            Err(e) => {
                warn!(
                    genes = ?individual.genes,
                    error = %e,
                    "Candidate evaluation failed, scoring as zero"
                );
                individual.params = self.encoding.decode(&individual.genes).ok();
                individual.fitness = Some(FitnessVector::ZERO);
                individual.error = Some(e.to_string());
                true
            }
        }
    }

    /// Evaluate every unevaluated individual in parallel.
    ///
    /// Returns `(evaluations, failures)`.
    fn evaluate_pending(&self, population: &mut [Individual]) -> (usize, usize) {
        let pending: Vec<&mut Individual> = population
            .iter_mut()
            .filter(|i| i.fitness.is_none())
            .collect();
        let evaluations = pending.len();

        let run = move || -> usize {
            pending
                .into_par_iter()
                .map(|individual| usize::from(self.evaluate_individual(individual)))
                .sum()
        };

        let failures = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };
        (evaluations, failures)
    }

    fn fitness_keys(&self, population: &[Individual]) -> Vec<RankKey> {
        let fitnesses: Vec<FitnessVector> =
            population.iter().map(Individual::fitness_or_zero).collect();
        self.ranking.keys(&fitnesses)
    }

    /// Run the search to completion
    pub fn run(&self) -> Result<SearchOutcome> {
        let seed = self.config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let noise = Normal::new(self.config.mutation_mean, self.config.mutation_std_dev)
            .map_err(|e| Error::config(format!("invalid mutation distribution: {}", e)))?;

        let start = Instant::now();
        let population_size = self.config.population_size;
        let elite_count = self.config.elite_count;

        info!(
            measurements = self.measurements.len(),
            population = population_size,
            generations = self.config.generations,
            ranking = ?self.ranking.strategy(),
            seed,
            "Starting parameter search"
        );
        if self.measurements.is_empty() {
            warn!("Parameter search over an empty batch; every candidate will score zero");
        }

        let mut population: Vec<Individual> = (0..population_size)
            .map(|_| Individual::new([rng.gen::<f64>(), rng.gen::<f64>()]))
            .collect();

        let mut hall_of_fame = HallOfFame::new(self.config.hall_of_fame_size);
        let mut history = Vec::with_capacity(self.config.generations + 1);

        let (evaluations, failures) = self.evaluate_pending(&mut population);
        hall_of_fame.update(&population, &self.ranking);
        let stats =
            GenerationStats::compute(0, evaluations, failures, &population, &self.ranking);
        self.log_generation(&stats);
        history.push(stats);

        for generation in 1..=self.config.generations {
            let keys = self.fitness_keys(&population);

            let mut order: Vec<usize> = (0..population.len()).collect();
            order.sort_by(|&a, &b| compare_keys(&keys[b], &keys[a]));
            let elites: Vec<Individual> = order
                .iter()
                .take(elite_count)
                .map(|&i| population[i].clone())
                .collect();

            let selected = select_tournament(
                &keys,
                population_size - elites.len(),
                self.config.tournament_size,
                &mut rng,
            );
            let mut offspring: Vec<Individual> =
                selected.into_iter().map(|i| population[i].clone()).collect();

            for i in (1..offspring.len()).step_by(2) {
                if rng.gen::<f64>() < self.config.crossover_probability {
                    let (left, right) = offspring.split_at_mut(i);
                    let (a, b) = (&mut left[i - 1], &mut right[0]);
                    if crossover_two_point(&mut a.genes, &mut b.genes, &mut rng) {
                        a.invalidate();
                        b.invalidate();
                    }
                }
            }

            for individual in offspring.iter_mut() {
                if rng.gen::<f64>() < self.config.mutation_probability
                    && mutate_gaussian(
                        &mut individual.genes,
                        &noise,
                        self.config.gene_mutation_probability,
                        &mut rng,
                    )
                {
                    individual.invalidate();
                }
            }

            population = elites;
            population.extend(offspring);

            let (evaluations, failures) = self.evaluate_pending(&mut population);
            hall_of_fame.update(&population, &self.ranking);
            let stats = GenerationStats::compute(
                generation,
                evaluations,
                failures,
                &population,
                &self.ranking,
            );
            self.log_generation(&stats);
            history.push(stats);
        }

        let outcome = SearchOutcome {
            population,
            hall_of_fame,
            history,
            seed,
            ranking: self.ranking,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        if let Some(best) = outcome.best() {
            info!(
                seed,
                evaluations = outcome.evaluations(),
                failures = outcome.failures(),
                elapsed_ms = outcome.elapsed_ms,
                best_fitness = %best.fitness_or_zero(),
                best_genes = ?best.genes,
                "Parameter search complete"
            );
        }

        Ok(outcome)
    }

    fn log_generation(&self, stats: &GenerationStats) {
        if stats.failures > 0 {
            debug!(
                generation = stats.generation,
                failures = stats.failures,
                "Generation had failed evaluations"
            );
        }
        info!(
            generation = stats.generation,
            evaluations = stats.evaluations,
            best = %stats.best,
            mean_breadth = stats.mean[0],
            mean_density = stats.mean[2],
            "Generation evaluated"
        );
    }
}
