//! Breach classification: live or projected counts against safe limits.
//!
//! # Statuses
//!
//! | Status | Condition | Alerts? |
//! |--------|-----------|---------|
//! | `Unknown` | limit absent or zero | no (shown as "N/A") |
//! | `Safe` | `count < ratio × limit` | no |
//! | `Approaching` | `ratio × limit ≤ count < limit` | warning |
//! | `Breached` | `count ≥ limit` | yes |
//!
//! The approaching ratio defaults to 0.8. A finer five-tier [`Band`] is
//! derived for display only and never drives alerting.
//!
//! ```
//! use crowdwatch_logic::classify::{classify, Status};
//!
//! assert_eq!(classify(150, Some(100)), Status::Breached);
//! assert_eq!(classify(85, Some(100)), Status::Approaching);
//! assert_eq!(classify(10, Some(100)), Status::Safe);
//! assert_eq!(classify(10, None), Status::Unknown);
//! ```

use serde::{Deserialize, Serialize};

use crate::snapshot::OccupancySnapshot;
use crate::zones::ZoneCatalog;

/// Default fraction of the limit at which a zone is `Approaching`.
pub const DEFAULT_APPROACHING_RATIO: f64 = 0.8;

/// Alerting status of a single zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Safe,
    Approaching,
    Breached,
    /// No usable limit configured; alerts like `Safe`.
    Unknown,
}

impl Status {
    /// Whether this status raises a breach alert.
    pub fn is_alerting(self) -> bool {
        self == Status::Breached
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Safe => "safe",
            Status::Approaching => "approaching",
            Status::Breached => "breached",
            Status::Unknown => "N/A",
        }
    }
}

/// Five-tier utilization banding for color display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Band {
    /// Below 30%.
    Low,
    /// 30% to below 60%.
    Moderate,
    /// 60% to below 85%.
    Elevated,
    /// 85% to below 100%.
    High,
    /// At or above 100%.
    Over,
}

/// Classify with the default approaching ratio.
pub fn classify(count: u32, limit: Option<u32>) -> Status {
    classify_with(count, limit, DEFAULT_APPROACHING_RATIO)
}

/// Classify `count` against `limit` using `approaching_ratio`.
pub fn classify_with(count: u32, limit: Option<u32>, approaching_ratio: f64) -> Status {
    let limit = match limit {
        Some(l) if l > 0 => l,
        _ => return Status::Unknown,
    };
    if count >= limit {
        Status::Breached
    } else if count as f64 >= limit as f64 * approaching_ratio {
        Status::Approaching
    } else {
        Status::Safe
    }
}

/// Display band for `count` against `limit`, `None` when the limit is unusable.
pub fn band(count: u32, limit: Option<u32>) -> Option<Band> {
    let limit = limit.filter(|&l| l > 0)? as u64;
    // Integer percent comparisons avoid float edge wobble at the boundaries.
    let scaled = count as u64 * 100;
    Some(if scaled >= limit * 100 {
        Band::Over
    } else if scaled >= limit * 85 {
        Band::High
    } else if scaled >= limit * 60 {
        Band::Elevated
    } else if scaled >= limit * 30 {
        Band::Moderate
    } else {
        Band::Low
    })
}

/// One zone's classification, as shown on a status card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStatus {
    pub zone: String,
    pub count: u32,
    pub limit: Option<u32>,
    pub status: Status,
    pub band: Option<Band>,
}

/// Every zone in a snapshot bucketed by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBoard {
    pub safe: Vec<ZoneStatus>,
    pub approaching: Vec<ZoneStatus>,
    pub breached: Vec<ZoneStatus>,
    pub unknown: Vec<ZoneStatus>,
}

impl StatusBoard {
    pub fn len(&self) -> usize {
        self.safe.len() + self.approaching.len() + self.breached.len() + self.unknown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Classify every zone in `snapshot`, in snapshot order.
pub fn classify_snapshot(
    snapshot: &OccupancySnapshot,
    catalog: &ZoneCatalog,
    approaching_ratio: f64,
) -> Vec<ZoneStatus> {
    snapshot
        .iter()
        .map(|(zone, count)| {
            let limit = catalog.limit(zone);
            ZoneStatus {
                zone: zone.to_string(),
                count,
                limit,
                status: classify_with(count, limit, approaching_ratio),
                band: band(count, limit),
            }
        })
        .collect()
}

/// Group a snapshot's zones into status buckets.
pub fn status_board(
    snapshot: &OccupancySnapshot,
    catalog: &ZoneCatalog,
    approaching_ratio: f64,
) -> StatusBoard {
    let mut board = StatusBoard::default();
    for entry in classify_snapshot(snapshot, catalog, approaching_ratio) {
        match entry.status {
            Status::Safe => board.safe.push(entry),
            Status::Approaching => board.approaching.push(entry),
            Status::Breached => board.breached.push(entry),
            Status::Unknown => board.unknown.push(entry),
        }
    }
    board
}
