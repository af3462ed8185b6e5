//! Venue-wide headline numbers for the overview banner.

use serde::{Deserialize, Serialize};

use crate::classify::{classify, Status};
use crate::snapshot::OccupancySnapshot;
use crate::zones::ZoneCatalog;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewMetrics {
    pub total_population: u64,
    pub total_zones: usize,
    /// Zones at or above their safe limit.
    pub alert_zones: usize,
    /// Highest total population seen so far this session.
    pub peak_occupancy: u64,
}

/// Running maximum of total venue population across polls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakTracker {
    peak: u64,
}

impl PeakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a new total and return the updated peak.
    pub fn observe(&mut self, total: u64) -> u64 {
        self.peak = self.peak.max(total);
        self.peak
    }

    pub fn peak(&self) -> u64 {
        self.peak
    }
}

/// Compute overview metrics, folding this snapshot's total into `peak`.
pub fn overview(
    snapshot: &OccupancySnapshot,
    catalog: &ZoneCatalog,
    peak: &mut PeakTracker,
) -> OverviewMetrics {
    let total_population = snapshot.total();
    let alert_zones = snapshot
        .iter()
        .filter(|(zone, count)| classify(*count, catalog.limit(zone)) == Status::Breached)
        .count();
    OverviewMetrics {
        total_population,
        total_zones: snapshot.len(),
        alert_zones,
        peak_occupancy: peak.observe(total_population),
    }
}
