//! Dissimilarity between two probe measurements.
//!
//! Two failures are close when they hit the same domain at nearly the same
//! time. Measurements of different domains are never part of one event, so
//! they sit at the maximum distance regardless of timing. Domains compare
//! ignoring ASCII case, as in the measurement filter.

use proddle_core::{config::DistanceConfig, Error, Measurement, Result};
use std::fmt;

/// Upper bound of every distance, also used as the matrix diagonal placeholder
pub const MAX_DISTANCE: f64 = 100.0;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Pairwise dissimilarity between measurements.
///
/// Implementations must be pure and symmetric and return values in
/// `[0, max_distance()]`.
pub trait MeasurementDistance: Send + Sync + fmt::Debug {
    /// Distance between `a` and `b`
    fn distance(&self, a: &Measurement, b: &Measurement) -> f64;

    /// Largest value `distance` can return
    fn max_distance(&self) -> f64 {
        MAX_DISTANCE
    }
}

/// Same-domain time proximity, saturating at `cap_hours`.
///
/// `distance = 100 * Δt / cap` for `Δt < cap`, otherwise 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalDomainDistance {
    cap_hours: f64,
}

impl TemporalDomainDistance {
    /// Create a distance function saturating after `cap_hours`
    pub fn new(cap_hours: f64) -> Result<Self> {
        if !(cap_hours.is_finite() && cap_hours > 0.0) {
            return Err(Error::invalid_parameter(
                "cap_hours",
                cap_hours,
                "must be a positive number of hours",
            ));
        }
        Ok(Self { cap_hours })
    }

    /// Build from configuration
    pub fn from_config(config: &DistanceConfig) -> Result<Self> {
        Self::new(config.cap_hours)
    }

    /// Saturation point in hours
    pub fn cap_hours(&self) -> f64 {
        self.cap_hours
    }

    /// Convert a distance back to the time difference (hours) it represents
    pub fn to_hours(&self, distance: f64) -> f64 {
        distance / MAX_DISTANCE * self.cap_hours
    }
}

impl Default for TemporalDomainDistance {
    fn default() -> Self {
        Self { cap_hours: 8.0 }
    }
}

impl MeasurementDistance for TemporalDomainDistance {
    fn distance(&self, a: &Measurement, b: &Measurement) -> f64 {
        if !a.domain.eq_ignore_ascii_case(&b.domain) {
            return MAX_DISTANCE;
        }

        let delta_hours = a.timestamp.abs_diff(b.timestamp) as f64 / SECONDS_PER_HOUR;
        if delta_hours >= self.cap_hours {
            MAX_DISTANCE
        } else {
            MAX_DISTANCE * delta_hours / self.cap_hours
        }
    }
}
