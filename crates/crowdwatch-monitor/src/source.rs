//! The external occupancy data source.
//!
//! Transport (HTTP, a realtime database, a file drop) lives outside this
//! workspace; it only has to hand back raw counts and the current limits.
//! Retry and backoff are the source's business: a failed fetch is logged by
//! the sampler and the previous snapshot stays published.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use crowdwatch_logic::zones::ZoneCatalog;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("occupancy source unavailable: {0}")]
    Unavailable(String),
    #[error("occupancy source returned malformed data: {0}")]
    Malformed(String),
}

/// Supplies raw per-zone counts and configured safe limits.
#[async_trait]
pub trait OccupancySource: Send + Sync {
    /// Latest raw `{zone: count}` object. Values are validated by the sampler.
    async fn fetch_counts(&self) -> Result<Map<String, Value>, SourceError>;

    /// Current safe limits (and geometry, if known) for every zone.
    async fn fetch_limits(&self) -> Result<ZoneCatalog, SourceError>;
}

/// In-memory source whose data is set directly. Useful for replay and tests.
#[derive(Debug, Default)]
pub struct StaticSource {
    counts: Mutex<Map<String, Value>>,
    limits: Mutex<ZoneCatalog>,
    failing: AtomicBool,
}

impl StaticSource {
    pub fn new(limits: ZoneCatalog) -> Self {
        Self {
            limits: Mutex::new(limits),
            ..Self::default()
        }
    }

    pub fn set_counts(&self, counts: Map<String, Value>) {
        *self.counts.lock() = counts;
    }

    /// Parse and set counts from a JSON object literal.
    pub fn set_counts_json(&self, json: &str) -> Result<(), SourceError> {
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(map)) => {
                self.set_counts(map);
                Ok(())
            }
            Ok(other) => Err(SourceError::Malformed(format!(
                "expected a JSON object, got {other}"
            ))),
            Err(err) => Err(SourceError::Malformed(err.to_string())),
        }
    }

    pub fn set_limits(&self, limits: ZoneCatalog) {
        *self.limits.lock() = limits;
    }

    /// Make every fetch fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(SourceError::Unavailable("source marked as failing".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OccupancySource for StaticSource {
    async fn fetch_counts(&self) -> Result<Map<String, Value>, SourceError> {
        self.check()?;
        Ok(self.counts.lock().clone())
    }

    async fn fetch_limits(&self) -> Result<ZoneCatalog, SourceError> {
        self.check()?;
        Ok(self.limits.lock().clone())
    }
}
