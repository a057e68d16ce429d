//! Ordering of fitness vectors for selection.
//!
//! How the three fitness components combine is a tuning choice, so the
//! strategy is configurable:
//!
//! - [`RankingStrategy::Lexicographic`]: weighted components compared in
//!   order, vantage breadth first. The default, and the ordering the
//!   published tuning results were produced with.
//! - [`RankingStrategy::WeightedSum`]: a single weighted sum.
//! - [`RankingStrategy::Pareto`]: non-dominated front within the current
//!   population first, weighted sum second.
//!
//! Every strategy reduces to a [`RankKey`] compared lexicographically with
//! `f64::total_cmp`, which keeps sorting and tournaments on a total order.

use crate::fitness::{FitnessVector, FITNESS_COMPONENTS};
use proddle_core::config::{RankingStrategy, SearchConfig};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparable key; larger is better
pub type RankKey = [f64; FITNESS_COMPONENTS];

/// Compare two keys lexicographically (total order)
pub fn compare_keys(a: &RankKey, b: &RankKey) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Fitness ordering for one search run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessRanking {
    strategy: RankingStrategy,
    weights: [f64; FITNESS_COMPONENTS],
}

impl Default for FitnessRanking {
    fn default() -> Self {
        Self::new(RankingStrategy::default(), [1.0; FITNESS_COMPONENTS])
    }
}

impl FitnessRanking {
    /// Create a ranking with explicit weights
    pub fn new(strategy: RankingStrategy, weights: [f64; FITNESS_COMPONENTS]) -> Self {
        Self { strategy, weights }
    }

    /// Build from search configuration
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.ranking, config.fitness_weights)
    }

    /// Strategy in use
    pub fn strategy(&self) -> RankingStrategy {
        self.strategy
    }

    fn weighted(&self, fitness: &FitnessVector) -> [f64; FITNESS_COMPONENTS] {
        let c = fitness.components();
        [
            c[0] * self.weights[0],
            c[1] * self.weights[1],
            c[2] * self.weights[2],
        ]
    }

    /// Sum of weighted components
    pub fn weighted_sum(&self, fitness: &FitnessVector) -> f64 {
        self.weighted(fitness).iter().sum()
    }

    /// `a` is no worse than `b` in every component and better in one
    pub fn dominates(&self, a: &FitnessVector, b: &FitnessVector) -> bool {
        let (wa, wb) = (self.weighted(a), self.weighted(b));
        let no_worse = wa.iter().zip(wb.iter()).all(|(x, y)| x >= y);
        let better = wa.iter().zip(wb.iter()).any(|(x, y)| x > y);
        no_worse && better
    }

    /// Key independent of any population, used across generations.
    ///
    /// Pareto ranking has no population-free front, so it falls back to the
    /// weighted sum here.
    pub fn absolute_key(&self, fitness: &FitnessVector) -> RankKey {
        match self.strategy {
            RankingStrategy::Lexicographic => self.weighted(fitness),
            RankingStrategy::WeightedSum | RankingStrategy::Pareto => {
                [self.weighted_sum(fitness), 0.0, 0.0]
            }
        }
    }

    /// Compare two fitness vectors by their absolute keys
    pub fn compare(&self, a: &FitnessVector, b: &FitnessVector) -> Ordering {
        compare_keys(&self.absolute_key(a), &self.absolute_key(b))
    }

    /// Keys for every member of a population, parallel to `fitnesses`
    pub fn keys(&self, fitnesses: &[FitnessVector]) -> Vec<RankKey> {
        match self.strategy {
            RankingStrategy::Pareto => {
                let fronts = self.pareto_fronts(fitnesses);
                fitnesses
                    .iter()
                    .zip(fronts)
                    .map(|(f, front)| [-(front as f64), self.weighted_sum(f), 0.0])
                    .collect()
            }
            _ => fitnesses.iter().map(|f| self.absolute_key(f)).collect(),
        }
    }

    /// Non-dominated front index (0 = best) of each member
    pub fn pareto_fronts(&self, fitnesses: &[FitnessVector]) -> Vec<usize> {
        let n = fitnesses.len();
        let mut fronts = vec![usize::MAX; n];
        let mut remaining: Vec<usize> = (0..n).collect();
        let mut front = 0;

        while !remaining.is_empty() {
            let current: Vec<usize> = remaining
                .iter()
                .copied()
                .filter(|&i| {
                    !remaining
                        .iter()
                        .any(|&j| j != i && self.dominates(&fitnesses[j], &fitnesses[i]))
                })
                .collect();

            for &i in &current {
                fronts[i] = front;
            }
            remaining.retain(|i| fronts[*i] == usize::MAX);
            front += 1;
        }

        fronts
    }
}
