//! Failure events: clusters turned into readable summaries.

use crate::clustering::Labeling;
use crate::fitness::tally_events;
use chrono::{DateTime, Utc};
use proddle_core::{Error, Measurement, MeasurementId, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One correlated failure event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEvent {
    /// Cluster label the event was built from
    pub label: i32,
    /// Domains of the members, sorted
    pub domains: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Distinct vantages, sorted
    pub vantages: Vec<String>,
    pub members: Vec<MeasurementId>,
    /// Count of members per parsed error code; uncoded errors are omitted
    pub error_codes: BTreeMap<i64, usize>,
}

impl FailureEvent {
    /// Seconds between the first and last member
    pub fn duration_secs(&self) -> i64 {
        (self.last_seen - self.first_seen).num_seconds()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn vantage_count(&self) -> usize {
        self.vantages.len()
    }

    /// Most frequent error code, lowest code on ties
    pub fn dominant_error_code(&self) -> Option<i64> {
        self.error_codes
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(code, _)| *code)
    }
}

fn timestamp_to_utc(measurement: &Measurement) -> Result<DateTime<Utc>> {
    measurement.observed_at().ok_or_else(|| {
        Error::validation(format!(
            "measurement {} has an unrepresentable timestamp {}",
            measurement.id, measurement.timestamp
        ))
    })
}

/// Summarize every non-noise cluster, ordered by first failure time
/// (label breaks ties).
pub fn summarize(labeling: &Labeling, measurements: &[Measurement]) -> Result<Vec<FailureEvent>> {
    // validates lengths
    tally_events(labeling, measurements)?;

    let mut events = Vec::new();
    for (label, members) in labeling.clusters() {
        let mut domains = BTreeSet::new();
        let mut vantages = BTreeSet::new();
        let mut error_codes = BTreeMap::new();
        let mut ids = Vec::with_capacity(members.len());
        let mut first = i64::MAX;
        let mut last = i64::MIN;
        let mut first_idx = members[0];
        let mut last_idx = members[0];

        for &i in &members {
            let m = &measurements[i];
            domains.insert(m.domain.to_ascii_lowercase());
            vantages.insert(m.vantage.clone());
            ids.push(m.id.clone());
            if let Some(code) = m.error_code() {
                *error_codes.entry(code).or_insert(0) += 1;
            }
            if m.timestamp < first {
                first = m.timestamp;
                first_idx = i;
            }
            if m.timestamp > last {
                last = m.timestamp;
                last_idx = i;
            }
        }

        events.push(FailureEvent {
            label,
            domains: domains.into_iter().collect(),
            first_seen: timestamp_to_utc(&measurements[first_idx])?,
            last_seen: timestamp_to_utc(&measurements[last_idx])?,
            vantages: vantages.into_iter().collect(),
            members: ids,
            error_codes,
        });
    }

    events.sort_by(|a, b| a.first_seen.cmp(&b.first_seen).then(a.label.cmp(&b.label)));
    Ok(events)
}
