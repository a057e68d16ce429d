//! Per-generation statistics and the hall of fame.

use super::ranking::{compare_keys, FitnessRanking};
use super::Individual;
use crate::fitness::{FitnessVector, FITNESS_COMPONENTS};
use serde::{Deserialize, Serialize};

/// Summary of one generation after evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// 0 is the initial population
    pub generation: usize,
    /// Individuals evaluated in this generation
    pub evaluations: usize,
    /// Evaluations that failed and were scored zero
    pub failures: usize,
    /// Best fitness in the population
    pub best: FitnessVector,
    /// Component-wise mean over the population
    pub mean: [f64; FITNESS_COMPONENTS],
    /// Component-wise maximum over the population
    pub max: [f64; FITNESS_COMPONENTS],
}

impl GenerationStats {
    /// Compute statistics over an evaluated population
    pub fn compute(
        generation: usize,
        evaluations: usize,
        failures: usize,
        population: &[Individual],
        ranking: &FitnessRanking,
    ) -> Self {
        let fitnesses: Vec<FitnessVector> =
            population.iter().map(Individual::fitness_or_zero).collect();

        let best = fitnesses
            .iter()
            .copied()
            .max_by(|a, b| ranking.compare(a, b))
            .unwrap_or(FitnessVector::ZERO);

        let mut mean = [0.0; FITNESS_COMPONENTS];
        let mut max = [f64::NEG_INFINITY; FITNESS_COMPONENTS];
        for f in &fitnesses {
            for (k, c) in f.components().iter().enumerate() {
                mean[k] += c;
                max[k] = max[k].max(*c);
            }
        }
        if fitnesses.is_empty() {
            max = [0.0; FITNESS_COMPONENTS];
        } else {
            let n = fitnesses.len() as f64;
            mean.iter_mut().for_each(|m| *m /= n);
        }

        Self {
            generation,
            evaluations,
            failures,
            best,
            mean,
            max,
        }
    }
}

/// Best distinct individuals seen over the whole run, best first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HallOfFame {
    capacity: usize,
    members: Vec<Individual>,
}

impl HallOfFame {
    /// Create an empty hall of fame
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            members: Vec::with_capacity(capacity),
        }
    }

    /// Members, best first
    pub fn members(&self) -> &[Individual] {
        &self.members
    }

    /// Best individual seen so far
    pub fn best(&self) -> Option<&Individual> {
        self.members.first()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Merge evaluated individuals. Duplicate genomes keep their first entry.
    pub fn update(&mut self, population: &[Individual], ranking: &FitnessRanking) {
        if self.capacity == 0 {
            return;
        }

        for candidate in population.iter().filter(|i| i.fitness.is_some()) {
            if self.members.iter().any(|m| m.genes == candidate.genes) {
                continue;
            }
            self.members.push(candidate.clone());
        }

        // stable sort keeps earlier entries ahead on ties
        self.members.sort_by(|a, b| {
            compare_keys(
                &ranking.absolute_key(&b.fitness_or_zero()),
                &ranking.absolute_key(&a.fitness_or_zero()),
            )
        });
        self.members.truncate(self.capacity);
    }
}
