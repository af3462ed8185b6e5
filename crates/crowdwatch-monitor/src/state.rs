//! Shared monitor state with publish-by-swap semantics.
//!
//! Every published value is immutable behind an `Arc`. Writers build a new
//! value and swap the pointer under a short write lock; readers clone the
//! pointers under a read lock and then work lock-free. An evaluation
//! therefore always sees a snapshot and a group-position vector that were
//! published together, never a half-updated pair.

use std::sync::Arc;

use crowdwatch_logic::flow::{advance_all, MovementGroup};
use crowdwatch_logic::overview::PeakTracker;
use crowdwatch_logic::report::AlertReport;
use crowdwatch_logic::snapshot::OccupancySnapshot;
use crowdwatch_logic::zones::ZoneCatalog;
use parking_lot::{Mutex, RwLock};

/// A consistent set of evaluation inputs.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    /// Bumped on every publication (new snapshot or group advance).
    pub generation: u64,
    pub snapshot: Arc<OccupancySnapshot>,
    pub catalog: Arc<ZoneCatalog>,
    pub groups: Arc<Vec<MovementGroup>>,
}

#[derive(Debug, Default)]
pub struct SharedState {
    inputs: RwLock<Inputs>,
    report: RwLock<Option<Arc<AlertReport>>>,
    peak: Mutex<PeakTracker>,
}

impl SharedState {
    pub fn new(groups: Vec<MovementGroup>) -> Self {
        Self {
            inputs: RwLock::new(Inputs {
                groups: Arc::new(groups),
                ..Inputs::default()
            }),
            ..Self::default()
        }
    }

    /// Copy the current input pointers.
    pub fn capture(&self) -> Inputs {
        self.inputs.read().clone()
    }

    pub fn generation(&self) -> u64 {
        self.inputs.read().generation
    }

    /// Replace the snapshot and catalog. Returns the new generation.
    pub fn publish_snapshot(&self, snapshot: OccupancySnapshot, catalog: ZoneCatalog) -> u64 {
        let snapshot = Arc::new(snapshot);
        let catalog = Arc::new(catalog);
        let mut inputs = self.inputs.write();
        inputs.snapshot = snapshot;
        inputs.catalog = catalog;
        inputs.generation += 1;
        inputs.generation
    }

    /// Move every group one step along its path. Returns the new generation.
    pub fn advance_groups(&self) -> u64 {
        let mut inputs = self.inputs.write();
        inputs.groups = Arc::new(advance_all(&inputs.groups));
        inputs.generation += 1;
        inputs.generation
    }

    /// Replace the group definitions (e.g. after a venue reload).
    pub fn replace_groups(&self, groups: Vec<MovementGroup>) -> u64 {
        let groups = Arc::new(groups);
        let mut inputs = self.inputs.write();
        inputs.groups = groups;
        inputs.generation += 1;
        inputs.generation
    }

    /// Store `report` unless a report from a newer generation is already published.
    ///
    /// Returns whether the report was stored.
    pub fn store_report(&self, report: AlertReport) -> bool {
        let mut slot = self.report.write();
        if let Some(existing) = slot.as_ref() {
            if existing.generation > report.generation {
                log::debug!(
                    "discarding stale report gen={} (published gen={})",
                    report.generation,
                    existing.generation
                );
                return false;
            }
        }
        *slot = Some(Arc::new(report));
        true
    }

    pub fn latest_report(&self) -> Option<Arc<AlertReport>> {
        self.report.read().clone()
    }

    pub(crate) fn peak(&self) -> &Mutex<PeakTracker> {
        &self.peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> Vec<MovementGroup> {
        vec![MovementGroup::new("Group 1", vec!["A", "B"], 10)]
    }

    #[test]
    fn test_generation_bumps() {
        let state = SharedState::new(groups());
        assert_eq!(state.generation(), 0);
        assert_eq!(
            state.publish_snapshot(OccupancySnapshot::default(), ZoneCatalog::new()),
            1
        );
        assert_eq!(state.advance_groups(), 2);
        assert_eq!(state.capture().groups[0].position, 1);
    }

    #[test]
    fn test_captured_inputs_are_isolated() {
        let state = SharedState::new(groups());
        state.publish_snapshot(
            OccupancySnapshot::from_counts([("A", 20)]),
            ZoneCatalog::from_limits([("A", 100)]),
        );
        let captured = state.capture();

        state.advance_groups();
        state.publish_snapshot(OccupancySnapshot::from_counts([("A", 99)]), ZoneCatalog::new());

        assert_eq!(captured.snapshot.get("A"), Some(20));
        assert_eq!(captured.groups[0].position, 0);
        assert_eq!(captured.catalog.limit("A"), Some(100));
        assert_eq!(state.capture().snapshot.get("A"), Some(99));
    }

    #[test]
    fn test_stale_report_discarded() {
        let state = SharedState::default();
        let report = |generation| AlertReport {
            generation,
            ..AlertReport::default()
        };
        assert!(state.store_report(report(5)));
        assert!(!state.store_report(report(3)));
        assert_eq!(state.latest_report().map(|r| r.generation), Some(5));
        assert!(state.store_report(report(6)));
        assert_eq!(state.latest_report().map(|r| r.generation), Some(6));
    }
}
