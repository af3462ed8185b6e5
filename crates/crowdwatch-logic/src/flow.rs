//! Deterministic crowd-flow projection over cyclic movement groups.
//!
//! Algorithm: "claim then apply"
//! 1. `steps = horizon / tick` (a zero tick means zero steps)
//! 2. Each step, every group at path position `p` tries to move `transfer`
//!    people from `path[p]` to `path[(p + 1) % len]`
//! 3. Claims are totalled per source zone. A source whose count at the start
//!    of the step covers the total grants every claim on it; otherwise none
//!    of them move (never partial, never first-come)
//! 4. All granted transfers are applied together, then every group advances
//!    its position whether or not it moved anyone
//!
//! The result does not depend on the order of `groups`, and counts can never
//! go negative: a zone only ever loses what its step-start count covered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::snapshot::OccupancySnapshot;

/// A cohort that repeatedly walks a fixed cycle of zones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementGroup {
    pub label: String,
    /// Zone ids in walking order; wraps from the last back to the first.
    pub path: Vec<String>,
    /// Index into `path` of the zone the group is currently in.
    #[serde(default)]
    pub position: usize,
    /// People assumed to move together each step.
    pub transfer: u32,
}

impl MovementGroup {
    pub fn new<S: Into<String>>(label: impl Into<String>, path: Vec<S>, transfer: u32) -> Self {
        Self {
            label: label.into(),
            path: path.into_iter().map(Into::into).collect(),
            position: 0,
            transfer,
        }
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    /// Position wrapped into the path; `None` for an empty path.
    fn index(&self) -> Option<usize> {
        (!self.path.is_empty()).then(|| self.position % self.path.len())
    }

    pub fn current_zone(&self) -> Option<&str> {
        self.index().map(|i| self.path[i].as_str())
    }

    pub fn next_zone(&self) -> Option<&str> {
        self.index()
            .map(|i| self.path[(i + 1) % self.path.len()].as_str())
    }

    /// This group one step later.
    pub fn advanced(&self) -> Self {
        let mut next = self.clone();
        next.position = match self.index() {
            Some(i) => (i + 1) % self.path.len(),
            None => 0,
        };
        next
    }
}

/// Advance every group by one step.
pub fn advance_all(groups: &[MovementGroup]) -> Vec<MovementGroup> {
    groups.iter().map(MovementGroup::advanced).collect()
}

/// Number of whole steps that fit in `horizon_minutes`.
pub fn steps_for(horizon_minutes: u32, tick_minutes: u32) -> u32 {
    if tick_minutes == 0 {
        0
    } else {
        horizon_minutes / tick_minutes
    }
}

/// Outcome of a projection: future counts plus where each group ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub snapshot: OccupancySnapshot,
    /// Final position per group, in input order.
    pub positions: Vec<usize>,
}

/// Project occupancy `horizon_minutes` ahead. Inputs are left untouched.
pub fn project(
    snapshot: &OccupancySnapshot,
    groups: &[MovementGroup],
    horizon_minutes: u32,
    tick_minutes: u32,
) -> OccupancySnapshot {
    project_with_positions(snapshot, groups, horizon_minutes, tick_minutes).snapshot
}

/// Like [`project`], also reporting the groups' final positions.
pub fn project_with_positions(
    snapshot: &OccupancySnapshot,
    groups: &[MovementGroup],
    horizon_minutes: u32,
    tick_minutes: u32,
) -> Projection {
    let mut counts = snapshot.counts().clone();
    let mut positions: Vec<usize> = groups.iter().map(|g| g.index().unwrap_or(0)).collect();

    for _ in 0..steps_for(horizon_minutes, tick_minutes) {
        step(&mut counts, groups, &mut positions);
    }

    Projection {
        snapshot: OccupancySnapshot::from_parts(snapshot.captured_at_ms, counts),
        positions,
    }
}

fn step(counts: &mut BTreeMap<String, u32>, groups: &[MovementGroup], positions: &mut [usize]) {
    let mut claims: BTreeMap<&str, Vec<(&str, u32)>> = BTreeMap::new();

    for (group, pos) in groups.iter().zip(positions.iter_mut()) {
        let len = group.path.len();
        if len == 0 {
            continue;
        }
        let from = group.path[*pos].as_str();
        let to = group.path[(*pos + 1) % len].as_str();
        *pos = (*pos + 1) % len;

        if group.transfer > 0 {
            claims.entry(from).or_default().push((to, group.transfer));
        }
    }

    let mut granted: Vec<(&str, &str, u32)> = Vec::new();
    for (from, wanted) in claims {
        let available = counts.get(from).copied().unwrap_or(0) as u64;
        let total: u64 = wanted.iter().map(|&(_, quantity)| quantity as u64).sum();
        if available >= total {
            granted.extend(wanted.into_iter().map(|(to, quantity)| (from, to, quantity)));
        }
    }

    for (from, to, quantity) in granted {
        if let Some(count) = counts.get_mut(from) {
            *count = count.saturating_sub(quantity);
        }
        let count = counts.entry(to.to_string()).or_insert(0);
        *count = count.saturating_add(quantity);
    }
}

/// Where the people currently in one zone are about to go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Destination zone → people heading there next step.
    pub toward: BTreeMap<String, u32>,
    /// People whose next path entry is the zone they are already in.
    pub stationary: u32,
}

/// Per-zone movement directions implied by the groups' current positions.
pub fn heading_summary(groups: &[MovementGroup]) -> BTreeMap<String, Heading> {
    let mut summary: BTreeMap<String, Heading> = BTreeMap::new();
    for group in groups {
        let (Some(current), Some(next)) = (group.current_zone(), group.next_zone()) else {
            continue;
        };
        let heading = summary.entry(current.to_string()).or_default();
        if current == next {
            heading.stationary += group.transfer;
        } else {
            *heading.toward.entry(next.to_string()).or_insert(0) += group.transfer;
        }
    }
    summary
}

/// People expected to arrive in each zone on the next step, ignoring
/// whether the source zone can actually supply them.
pub fn predicted_inflow(groups: &[MovementGroup]) -> BTreeMap<String, u32> {
    let mut inflow = BTreeMap::new();
    for group in groups {
        if let Some(next) = group.next_zone() {
            *inflow.entry(next.to_string()).or_insert(0) += group.transfer;
        }
    }
    inflow
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ab_group() -> MovementGroup {
        MovementGroup::new("Group 1", vec!["A", "B"], 10)
    }

    #[test]
    fn test_single_step_transfer() {
        let snapshot = OccupancySnapshot::from_counts([("A", 20), ("B", 0)]);
        let projected = project(&snapshot, &[ab_group()], 5, 5);
        assert_eq!(projected.get("A"), Some(10));
        assert_eq!(projected.get("B"), Some(10));
        // Input untouched
        assert_eq!(snapshot.get("A"), Some(20));
    }

    #[test]
    fn test_insufficient_source_still_advances() {
        let snapshot = OccupancySnapshot::from_counts([("A", 5), ("B", 0)]);
        let groups = [ab_group()];
        let result = project_with_positions(&snapshot, &groups, 5, 5);
        assert_eq!(result.snapshot.get("A"), Some(5));
        assert_eq!(result.snapshot.get("B"), Some(0));
        assert_eq!(result.positions, vec![1]);
        assert_eq!(groups[0].position, 0);
    }

    #[test]
    fn test_horizon_below_tick_is_identity() {
        let snapshot = OccupancySnapshot::from_counts([("A", 20), ("B", 3)]);
        assert_eq!(project(&snapshot, &[ab_group()], 4, 5), snapshot);
        assert_eq!(project(&snapshot, &[ab_group()], 0, 5), snapshot);
        assert_eq!(project(&snapshot, &[ab_group()], 60, 0), snapshot);
    }

    #[test]
    fn test_absent_destination_initialised() {
        let snapshot = OccupancySnapshot::from_counts([("A", 10)]);
        let projected = project(&snapshot, &[ab_group()], 5, 5);
        assert_eq!(projected.get("A"), Some(0));
        assert_eq!(projected.get("B"), Some(10));
    }

    #[test]
    fn test_absent_source_moves_nothing() {
        let snapshot = OccupancySnapshot::from_counts([("B", 50)]);
        let projected = project(&snapshot, &[ab_group()], 5, 5);
        assert_eq!(projected.get("A"), None);
        assert_eq!(projected.get("B"), Some(50));
    }

    #[test]
    fn test_round_trip_over_two_steps() {
        let snapshot = OccupancySnapshot::from_counts([("A", 20), ("B", 0)]);
        let projected = project(&snapshot, &[ab_group()], 10, 5);
        // Step 1: A→B, step 2 (group now at B): B→A
        assert_eq!(projected.get("A"), Some(20));
        assert_eq!(projected.get("B"), Some(0));
    }

    #[test]
    fn test_contended_source_moves_nobody() {
        // Two groups drawing 10 each from a zone holding only 15.
        let snapshot = OccupancySnapshot::from_counts([("A", 15)]);
        let groups = [
            MovementGroup::new("g1", vec!["A", "B"], 10),
            MovementGroup::new("g2", vec!["A", "C"], 10),
        ];
        let result = project_with_positions(&snapshot, &groups, 5, 5);
        assert_eq!(result.snapshot, snapshot);
        assert_eq!(result.positions, vec![1, 1]);
    }

    #[test]
    fn test_covered_source_grants_every_claim() {
        let snapshot = OccupancySnapshot::from_counts([("A", 20)]);
        let groups = [
            MovementGroup::new("g1", vec!["A", "B"], 10),
            MovementGroup::new("g2", vec!["A", "C"], 10),
        ];
        let projected = project(&snapshot, &groups, 5, 5);
        assert_eq!(projected.get("A"), Some(0));
        assert_eq!(projected.get("B"), Some(10));
        assert_eq!(projected.get("C"), Some(10));
    }

    #[test]
    fn test_group_order_does_not_matter() {
        let snapshot = OccupancySnapshot::from_counts([("A", 15), ("B", 40), ("C", 25), ("D", 7)]);
        let groups = vec![
            MovementGroup::new("g1", vec!["A", "B"], 10),
            MovementGroup::new("g2", vec!["A", "C"], 10),
            MovementGroup::new("g3", vec!["B", "A", "D"], 10),
            MovementGroup::new("g4", vec!["C", "B"], 20),
            MovementGroup::new("g5", vec!["D", "C", "A"], 5),
        ];
        let mut reversed = groups.clone();
        reversed.reverse();
        let mut rotated = groups.clone();
        rotated.rotate_left(2);

        for horizon in [5, 10, 15, 30, 60] {
            let expected = project(&snapshot, &groups, horizon, 5);
            assert_eq!(project(&snapshot, &reversed, horizon, 5), expected);
            assert_eq!(project(&snapshot, &rotated, horizon, 5), expected);
        }
    }

    #[test]
    fn test_inflow_not_available_as_outflow_same_step() {
        // g1 brings 10 into B, but g2 sees B's step-start count of 0.
        let snapshot = OccupancySnapshot::from_counts([("A", 10), ("B", 0)]);
        let groups = [
            MovementGroup::new("g1", vec!["A", "B"], 10),
            MovementGroup::new("g2", vec!["B", "C"], 10),
        ];
        let projected = project(&snapshot, &groups, 5, 5);
        assert_eq!(projected.get("B"), Some(10));
        assert_eq!(projected.get("C"), None);
    }

    #[test]
    fn test_total_population_is_conserved() {
        let snapshot = OccupancySnapshot::from_counts([("A", 47), ("B", 12), ("C", 80), ("D", 3)]);
        let groups = [
            MovementGroup::new("g1", vec!["C", "B", "A", "D"], 10),
            MovementGroup::new("g2", vec!["D", "C"], 10),
            MovementGroup::new("g3", vec!["A", "B"], 25),
        ];
        for horizon in [0, 5, 10, 25, 120] {
            assert_eq!(project(&snapshot, &groups, horizon, 5).total(), snapshot.total());
        }
    }

    #[test]
    fn test_position_wraps_out_of_range() {
        let group = MovementGroup::new("g", vec!["A", "B", "C"], 10).at(4);
        assert_eq!(group.current_zone(), Some("B"));
        assert_eq!(group.advanced().position, 2);
    }

    #[test]
    fn test_empty_path_is_inert() {
        let group = MovementGroup::new("g", Vec::<String>::new(), 10);
        assert_eq!(group.current_zone(), None);
        assert_eq!(group.advanced().position, 0);
        let snapshot = OccupancySnapshot::from_counts([("A", 10)]);
        assert_eq!(project(&snapshot, &[group], 25, 5), snapshot);
    }

    #[test]
    fn test_heading_summary() {
        let groups = [
            MovementGroup::new("g1", vec!["A", "B"], 10),
            MovementGroup::new("g2", vec!["A", "D"], 10),
            MovementGroup::new("g3", vec!["A", "A", "C"], 10),
            MovementGroup::new("g4", vec!["C", "B", "A", "D"], 10).at(1),
        ];
        let summary = heading_summary(&groups);
        let a = &summary["A"];
        assert_eq!(a.toward.get("B"), Some(&10));
        assert_eq!(a.toward.get("D"), Some(&10));
        assert_eq!(a.stationary, 10);
        assert_eq!(summary["B"].toward.get("A"), Some(&10));
    }

    #[test]
    fn test_predicted_inflow() {
        let groups = [
            MovementGroup::new("g1", vec!["A", "B"], 10),
            MovementGroup::new("g2", vec!["E", "F", "B"], 10).at(1),
            MovementGroup::new("g3", vec!["F", "A"], 10),
        ];
        let inflow = predicted_inflow(&groups);
        assert_eq!(inflow.get("B"), Some(&20));
        assert_eq!(inflow.get("A"), Some(&10));
    }
}
