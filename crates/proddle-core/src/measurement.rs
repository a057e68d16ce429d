//! Probe measurement records as consumed by the analysis pipeline.
//!
//! Records arrive from the measurement store (a BSON dump or a database query
//! in the surrounding tooling) as loosely typed documents. [`RawMeasurement`]
//! mirrors those documents, accepting the field names the vantage probes
//! write (`measurement_domain`, `vantage_hostname`, ...), and
//! [`Measurement::try_from_raw`] turns one into the validated, read-only
//! record the core works on.

use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque measurement identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasurementId(String);

impl MeasurementId {
    /// Create a new identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeasurementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One recorded probe outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Identifier assigned by the measurement store
    pub id: MeasurementId,
    /// Probed domain
    pub domain: String,
    /// Observation time (epoch seconds)
    pub timestamp: i64,
    /// Vantage (probe host) that observed the outcome
    pub vantage: String,
    /// Whether the probe failed
    pub has_error: bool,
    /// Raw error message reported by the probe, e.g. `"[28] Timeout was reached"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Measurement {
    /// Create a failed measurement
    pub fn failure(
        id: impl Into<String>,
        domain: impl Into<String>,
        timestamp: i64,
        vantage: impl Into<String>,
    ) -> Self {
        Self {
            id: MeasurementId::new(id),
            domain: domain.into(),
            timestamp,
            vantage: vantage.into(),
            has_error: true,
            error_message: None,
        }
    }

    /// Create a successful measurement
    pub fn success(
        id: impl Into<String>,
        domain: impl Into<String>,
        timestamp: i64,
        vantage: impl Into<String>,
    ) -> Self {
        Self {
            has_error: false,
            ..Self::failure(id, domain, timestamp, vantage)
        }
    }

    /// Attach an error message
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self.has_error = true;
        self
    }

    /// Observation time as a UTC datetime
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp, 0).single()
    }

    /// Numeric error code from a `"[code] message"` style error message
    pub fn error_code(&self) -> Option<i64> {
        let message = self.error_message.as_deref()?;
        let first = message.split_whitespace().next()?;
        first
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .ok()
    }

    /// Validate a raw store document and convert it.
    ///
    /// `index` is the record's position in its batch and is used both for
    /// error reporting and as the fallback identifier.
    pub fn try_from_raw(index: usize, raw: RawMeasurement) -> Result<Self> {
        let domain = raw
            .domain
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| Error::malformed_record(index, "missing domain"))?;

        let timestamp = raw
            .timestamp
            .ok_or_else(|| Error::malformed_record(index, "missing timestamp"))?;
        if timestamp < 0 {
            return Err(Error::malformed_record(
                index,
                format!("negative timestamp {}", timestamp),
            ));
        }

        let vantage = raw
            .vantage
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::malformed_record(index, "missing vantage"))?;

        let error_message = raw.error_message.filter(|m| !m.trim().is_empty());
        let has_error = raw.has_error.unwrap_or(error_message.is_some());

        let id = match raw.id {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Object(map)) => match map.get("$oid") {
                Some(serde_json::Value::String(oid)) => oid.clone(),
                _ => serde_json::Value::Object(map).to_string(),
            },
            Some(serde_json::Value::Null) | None => format!("m{}", index),
            Some(other) => other.to_string(),
        };

        Ok(Self {
            id: MeasurementId::new(id),
            domain,
            timestamp,
            vantage,
            has_error,
            error_message,
        })
    }

    /// Convert a whole batch, failing on the first malformed record
    pub fn try_from_raw_batch(raw: Vec<RawMeasurement>) -> Result<Vec<Self>> {
        raw.into_iter()
            .enumerate()
            .map(|(index, record)| Self::try_from_raw(index, record))
            .collect()
    }
}

/// Measurement document as written by the probes, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMeasurement {
    #[serde(default, alias = "_id")]
    pub id: Option<serde_json::Value>,
    #[serde(default, alias = "measurement_domain")]
    pub domain: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default, alias = "vantage_hostname")]
    pub vantage: Option<String>,
    #[serde(default, alias = "measurement_error")]
    pub has_error: Option<bool>,
    #[serde(default, alias = "measurement_error_message")]
    pub error_message: Option<String>,
}
