//! Seeded synthetic measurement batches for benchmarks and demos.

use proddle_core::Measurement;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const BASE_TIMESTAMP: i64 = 1_700_000_000;

const ERROR_MESSAGES: &[&str] = &[
    "[28] Timeout was reached",
    "[6] Could not resolve host",
    "[7] Failed to connect to host",
    "[35] SSL connect error",
];

/// Shape of a generated batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticBatch {
    /// Number of correlated outages
    pub outages: usize,
    /// Failures per outage, each from its own vantage where possible
    pub failures_per_outage: usize,
    /// Uncorrelated background failures
    pub background_failures: usize,
    pub vantages: usize,
    pub domains: usize,
    /// Observation window
    pub span_hours: f64,
    /// Spread of one outage
    pub outage_minutes: f64,
    pub seed: u64,
}

impl Default for SyntheticBatch {
    fn default() -> Self {
        Self {
            outages: 5,
            failures_per_outage: 12,
            background_failures: 40,
            vantages: 16,
            domains: 30,
            span_hours: 72.0,
            outage_minutes: 45.0,
            seed: 0,
        }
    }
}

impl SyntheticBatch {
    /// Batch with roughly `n` measurements, a quarter of them background noise
    pub fn with_size(n: usize, seed: u64) -> Self {
        let background = n / 4;
        let failures_per_outage = 10;
        Self {
            outages: (n - background) / failures_per_outage,
            failures_per_outage,
            background_failures: background + (n - background) % failures_per_outage,
            seed,
            ..Self::default()
        }
    }

    /// Total measurements generated
    pub fn len(&self) -> usize {
        self.outages * self.failures_per_outage + self.background_failures
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generate the batch, ordered by timestamp
    pub fn generate(&self) -> Vec<Measurement> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let span_secs = (self.span_hours * 3600.0).max(1.0) as i64;
        let outage_secs = (self.outage_minutes * 60.0).max(1.0) as i64;
        let domains = self.domains.max(1);
        let vantages: Vec<String> = (0..self.vantages.max(1))
            .map(|v| format!("vantage-{:02}", v))
            .collect();

        let mut measurements = Vec::with_capacity(self.len());

        for outage in 0..self.outages {
            let domain = format!("site{}.example", rng.gen_range(0..domains));
            let start = BASE_TIMESTAMP + rng.gen_range(0..span_secs);
            let message = ERROR_MESSAGES[outage % ERROR_MESSAGES.len()];
            let mut order = vantages.clone();
            order.shuffle(&mut rng);

            for i in 0..self.failures_per_outage {
                measurements.push(
                    Measurement::failure(
                        format!("o{}-{}", outage, i),
                        domain.clone(),
                        start + rng.gen_range(0..outage_secs),
                        order[i % order.len()].clone(),
                    )
                    .with_error_message(message),
                );
            }
        }

        for i in 0..self.background_failures {
            let message = ERROR_MESSAGES[rng.gen_range(0..ERROR_MESSAGES.len())];
            measurements.push(
                Measurement::failure(
                    format!("b{}", i),
                    format!("site{}.example", rng.gen_range(0..domains)),
                    BASE_TIMESTAMP + rng.gen_range(0..span_secs),
                    vantages[rng.gen_range(0..vantages.len())].clone(),
                )
                .with_error_message(message),
            );
        }

        measurements.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        measurements
    }
}
