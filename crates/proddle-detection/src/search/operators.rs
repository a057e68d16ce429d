//! Genetic operators: tournament selection, two-point crossover and
//! Gaussian mutation.
//!
//! All operators draw from the caller's RNG so a seeded run is reproducible.

use super::ranking::{compare_keys, RankKey};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::cmp::Ordering;

/// Pick `k` indices, each the best of `tournament_size` uniform draws
/// (with replacement). The first-drawn aspirant wins ties.
pub fn select_tournament<R: Rng + ?Sized>(
    keys: &[RankKey],
    k: usize,
    tournament_size: usize,
    rng: &mut R,
) -> Vec<usize> {
    if keys.is_empty() {
        return Vec::new();
    }

    (0..k)
        .map(|_| {
            let mut best = rng.gen_range(0..keys.len());
            for _ in 1..tournament_size {
                let aspirant = rng.gen_range(0..keys.len());
                if compare_keys(&keys[aspirant], &keys[best]) == Ordering::Greater {
                    best = aspirant;
                }
            }
            best
        })
        .collect()
}

/// Two-point crossover in place.
///
/// Cut points are drawn so the swapped slice `[p1, p2)` is never empty and
/// never starts at gene 0; for a two-gene genome this always exchanges the
/// second gene. Returns whether either parent changed.
pub fn crossover_two_point<R: Rng + ?Sized>(a: &mut [f64], b: &mut [f64], rng: &mut R) -> bool {
    let size = a.len().min(b.len());
    if size < 2 {
        return false;
    }

    let mut p1 = rng.gen_range(1..=size);
    let mut p2 = rng.gen_range(1..size);
    if p2 >= p1 {
        p2 += 1;
    } else {
        std::mem::swap(&mut p1, &mut p2);
    }

    let mut changed = false;
    for i in p1..p2 {
        if a[i] != b[i] {
            changed = true;
        }
        std::mem::swap(&mut a[i], &mut b[i]);
    }
    changed
}

/// Add Gaussian noise to each gene independently with probability
/// `gene_probability`. Returns whether any gene changed.
pub fn mutate_gaussian<R: Rng + ?Sized>(
    genes: &mut [f64],
    noise: &Normal<f64>,
    gene_probability: f64,
    rng: &mut R,
) -> bool {
    let mut changed = false;
    for gene in genes.iter_mut() {
        if rng.gen::<f64>() < gene_probability {
            let mutated = *gene + noise.sample(rng);
            if mutated != *gene {
                changed = true;
            }
            *gene = mutated;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_tournament_full_size_picks_best() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let keys = vec![[1.0, 0.0, 0.0], [5.0, 0.0, 0.0], [3.0, 0.0, 0.0]];
        // a huge tournament almost surely samples the best key
        let picks = select_tournament(&keys, 20, 64, &mut rng);
        assert_eq!(picks.len(), 20);
        assert!(picks.iter().all(|&i| i == 1));
    }

    #[test]
    fn test_tournament_never_picks_strictly_worst_with_size_two_pool() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let keys = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let picks = select_tournament(&keys, 200, 3, &mut rng);
        // index 0 wins only when all three draws hit it
        let zeros = picks.iter().filter(|&&i| i == 0).count();
        assert!(zeros < 60, "worst individual won {} of 200 tournaments", zeros);
    }

    #[test]
    fn test_tournament_empty_population() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(select_tournament(&[], 5, 3, &mut rng).is_empty());
    }

    #[test]
    fn test_two_point_on_two_genes_swaps_second_gene() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..50 {
            let mut a = [0.1, 0.2];
            let mut b = [0.7, 0.8];
            assert!(crossover_two_point(&mut a, &mut b, &mut rng));
            assert_eq!(a, [0.1, 0.8]);
            assert_eq!(b, [0.7, 0.2]);
        }
    }

    #[test]
    fn test_two_point_preserves_gene_multiset() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..50 {
            let mut a: Vec<f64> = (0..6).map(|i| i as f64).collect();
            let mut b: Vec<f64> = (0..6).map(|i| 10.0 + i as f64).collect();
            crossover_two_point(&mut a, &mut b, &mut rng);
            for i in 0..6 {
                let pair = [a[i], b[i]];
                assert!(pair.contains(&(i as f64)) && pair.contains(&(10.0 + i as f64)));
            }
            assert_eq!(a[0], 0.0);
        }
    }

    #[test]
    fn test_two_point_identical_parents_unchanged() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut a = [0.3, 0.3];
        let mut b = [0.3, 0.3];
        assert!(!crossover_two_point(&mut a, &mut b, &mut rng));
    }

    #[test]
    fn test_mutation_probability_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let noise = Normal::new(0.0, 1.0).unwrap();

        let mut genes = [0.5, 0.5];
        assert!(!mutate_gaussian(&mut genes, &noise, 0.0, &mut rng));
        assert_eq!(genes, [0.5, 0.5]);

        assert!(mutate_gaussian(&mut genes, &noise, 1.0, &mut rng));
        assert_ne!(genes[0], 0.5);
        assert_ne!(genes[1], 0.5);
    }

    #[test]
    fn test_mutation_noise_is_centered() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let mut total = 0.0;
        let trials = 2000;
        for _ in 0..trials {
            let mut genes = [0.0];
            mutate_gaussian(&mut genes, &noise, 1.0, &mut rng);
            total += genes[0];
        }
        let mean = total / trials as f64;
        assert!(mean.abs() < 0.15, "mean shift {}", mean);
    }
}
