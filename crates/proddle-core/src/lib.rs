//! # Proddle Core
//!
//! Shared building blocks for the Proddle failure-event analysis crates:
//! - [`Measurement`] records and their raw store representation
//! - [`AnalysisConfig`] with TOML file and environment loading
//! - the crate-wide [`Error`] and [`Result`] types

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod config;
pub mod error;
pub mod measurement;

pub use config::AnalysisConfig;
pub use error::{Error, Result};
pub use measurement::{Measurement, MeasurementId, RawMeasurement};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{
        AnalysisConfig, ClusteringConfig, DistanceConfig, FilterConfig, RankingStrategy,
        SearchConfig,
    };
    pub use crate::error::{Error, Result};
    pub use crate::measurement::{Measurement, MeasurementId, RawMeasurement};
}
