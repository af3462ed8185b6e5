//! Predictive alerting: current breaches plus breaches projected at each horizon.
//!
//! Evaluation is stateless: group positions are an input the caller advances
//! on its own cadence, and nothing is remembered between calls. A zone that
//! stays breached across several horizons is reported once per horizon, so
//! the list also conveys how long a predicted breach lasts.

use serde::{Deserialize, Serialize};

use crate::classify::{classify_with, Status};
use crate::config::EngineConfig;
use crate::flow::{project, MovementGroup};
use crate::snapshot::OccupancySnapshot;
use crate::zones::ZoneCatalog;

const MS_PER_MINUTE: u64 = 60_000;

/// When a predicted breach applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Horizon {
    /// Offset from the snapshot capture, in minutes.
    pub minutes: u32,
    /// Absolute time in unix milliseconds (capture time + offset).
    pub at_ms: u64,
}

/// A zone at or above its safe limit, now or at a future horizon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreachRecord {
    pub zone: String,
    pub count: u32,
    pub limit: u32,
    /// `None` for a live breach.
    pub horizon: Option<Horizon>,
}

impl BreachRecord {
    /// People above the limit.
    pub fn excess(&self) -> u32 {
        self.count.saturating_sub(self.limit)
    }

    pub fn is_predicted(&self) -> bool {
        self.horizon.is_some()
    }
}

/// Result of one evaluation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub current_breaches: Vec<BreachRecord>,
    pub future_breaches: Vec<BreachRecord>,
}

impl Evaluation {
    pub fn has_breaches(&self) -> bool {
        !self.current_breaches.is_empty() || !self.future_breaches.is_empty()
    }
}

/// Breached zones in `snapshot`, in snapshot order.
pub fn breaches(
    snapshot: &OccupancySnapshot,
    catalog: &ZoneCatalog,
    approaching_ratio: f64,
    horizon: Option<Horizon>,
) -> Vec<BreachRecord> {
    snapshot
        .iter()
        .filter_map(|(zone, count)| {
            let limit = catalog.limit(zone)?;
            (classify_with(count, Some(limit), approaching_ratio) == Status::Breached).then(|| {
                BreachRecord {
                    zone: zone.to_string(),
                    count,
                    limit,
                    horizon,
                }
            })
        })
        .collect()
}

/// Evaluate current and predicted breaches.
///
/// `horizons` are minute offsets; they are evaluated in ascending order and
/// duplicates are evaluated once.
pub fn evaluate(
    snapshot: &OccupancySnapshot,
    catalog: &ZoneCatalog,
    groups: &[MovementGroup],
    horizons: &[u32],
    config: &EngineConfig,
) -> Evaluation {
    let ratio = config.approaching_threshold_ratio;
    let current_breaches = breaches(snapshot, catalog, ratio, None);

    let mut ordered = horizons.to_vec();
    ordered.sort_unstable();
    ordered.dedup();

    let mut future_breaches = Vec::new();
    for minutes in ordered {
        let projected = project(snapshot, groups, minutes, config.tick_minutes);
        let horizon = Horizon {
            minutes,
            at_ms: snapshot
                .captured_at_ms
                .saturating_add(minutes as u64 * MS_PER_MINUTE),
        };
        future_breaches.extend(breaches(&projected, catalog, ratio, Some(horizon)));
    }

    Evaluation {
        current_breaches,
        future_breaches,
    }
}
