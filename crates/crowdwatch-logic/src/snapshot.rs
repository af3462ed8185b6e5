//! Occupancy snapshots: immutable `{zone -> count}` captures.
//!
//! A snapshot is produced fresh on every poll and superseded, never merged,
//! by the next one. Raw input from the counts endpoint is untrusted: any
//! entry that is not a non-negative whole number is dropped at ingestion so
//! that nothing invalid reaches the flow projection.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current wall-clock time in unix milliseconds (0 if the clock is before the epoch).
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Per-zone occupancy counts captured at a single instant.
///
/// Iteration is in ascending zone-id order, so everything derived from a
/// snapshot is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancySnapshot {
    /// Capture time in unix milliseconds. Zero means "untimestamped".
    pub captured_at_ms: u64,
    counts: BTreeMap<String, u32>,
}

/// Why a raw entry was left out of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    Negative,
    Fractional,
    NotNumeric,
    TooLarge,
}

/// A raw entry that did not make it into the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedEntry {
    pub zone: String,
    pub reason: RejectReason,
}

/// Result of ingesting raw counts: the clean snapshot plus what was dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ingested {
    pub snapshot: OccupancySnapshot,
    pub rejected: Vec<RejectedEntry>,
}

impl OccupancySnapshot {
    pub fn new(captured_at_ms: u64) -> Self {
        Self {
            captured_at_ms,
            counts: BTreeMap::new(),
        }
    }

    /// Untimestamped snapshot from already-validated counts.
    pub fn from_counts<I, K>(counts: I) -> Self
    where
        I: IntoIterator<Item = (K, u32)>,
        K: Into<String>,
    {
        Self {
            captured_at_ms: 0,
            counts: counts.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn at(mut self, captured_at_ms: u64) -> Self {
        self.captured_at_ms = captured_at_ms;
        self
    }

    /// Ingest signed counts, dropping negative entries.
    pub fn from_signed<I, K>(counts: I, captured_at_ms: u64) -> Ingested
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<String>,
    {
        let mut ingested = Ingested {
            snapshot: Self::new(captured_at_ms),
            rejected: Vec::new(),
        };
        for (zone, count) in counts {
            let zone = zone.into();
            match u32::try_from(count) {
                Ok(count) => {
                    ingested.snapshot.counts.insert(zone, count);
                }
                Err(_) => ingested.rejected.push(RejectedEntry {
                    zone,
                    reason: if count < 0 {
                        RejectReason::Negative
                    } else {
                        RejectReason::TooLarge
                    },
                }),
            }
        }
        ingested
    }

    /// Ingest a raw JSON object as returned by the counts endpoint.
    ///
    /// Whole-valued floats (`12.0`) are accepted; anything else that is not
    /// a non-negative integer fitting in `u32` is rejected.
    pub fn from_raw(raw: &Map<String, Value>, captured_at_ms: u64) -> Ingested {
        let mut ingested = Ingested {
            snapshot: Self::new(captured_at_ms),
            rejected: Vec::new(),
        };
        for (zone, value) in raw {
            match parse_count(value) {
                Ok(count) => {
                    ingested.snapshot.counts.insert(zone.clone(), count);
                }
                Err(reason) => ingested.rejected.push(RejectedEntry {
                    zone: zone.clone(),
                    reason,
                }),
            }
        }
        ingested
    }

    pub fn get(&self, zone: &str) -> Option<u32> {
        self.counts.get(zone).copied()
    }

    pub fn contains(&self, zone: &str) -> bool {
        self.counts.contains_key(zone)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn zones(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total people across all zones.
    pub fn total(&self) -> u64 {
        self.counts.values().map(|&c| c as u64).sum()
    }

    pub(crate) fn counts(&self) -> &BTreeMap<String, u32> {
        &self.counts
    }

    pub(crate) fn from_parts(captured_at_ms: u64, counts: BTreeMap<String, u32>) -> Self {
        Self {
            captured_at_ms,
            counts,
        }
    }
}

fn parse_count(value: &Value) -> Result<u32, RejectReason> {
    let Value::Number(n) = value else {
        return Err(RejectReason::NotNumeric);
    };
    if let Some(u) = n.as_u64() {
        return u32::try_from(u).map_err(|_| RejectReason::TooLarge);
    }
    if n.as_i64().is_some() {
        return Err(RejectReason::Negative);
    }
    match n.as_f64() {
        Some(f) if f < 0.0 => Err(RejectReason::Negative),
        Some(f) if f.fract() != 0.0 => Err(RejectReason::Fractional),
        Some(f) if f <= u32::MAX as f64 => Ok(f as u32),
        Some(_) => Err(RejectReason::TooLarge),
        None => Err(RejectReason::NotNumeric),
    }
}
