//! The complete per-cycle payload handed to the dashboard.
//!
//! `build_report` runs the whole pipeline once: classify the live snapshot,
//! project each horizon, derive suggestions, and summarise movement. It is
//! the only entry point the runtime needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::advisor::{suggest, Suggestion};
use crate::alerts::{evaluate, Evaluation};
use crate::classify::{status_board, StatusBoard};
use crate::config::EngineConfig;
use crate::flow::{heading_summary, predicted_inflow, Heading, MovementGroup};
use crate::overview::{overview, OverviewMetrics, PeakTracker};
use crate::snapshot::OccupancySnapshot;
use crate::zones::ZoneCatalog;

/// Where the groups are heading right now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementOutlook {
    pub headings: BTreeMap<String, Heading>,
    pub next_step_inflow: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertReport {
    /// Input generation this report was computed from (0 when built ad hoc).
    pub generation: u64,
    pub captured_at_ms: u64,
    #[serde(flatten)]
    pub evaluation: Evaluation,
    pub suggestions: Vec<Suggestion>,
    pub overview: OverviewMetrics,
    pub status_board: StatusBoard,
    pub outlook: MovementOutlook,
}

/// Run the full pipeline for one snapshot.
pub fn build_report(
    snapshot: &OccupancySnapshot,
    catalog: &ZoneCatalog,
    groups: &[MovementGroup],
    horizons: &[u32],
    config: &EngineConfig,
    peak: &mut PeakTracker,
) -> AlertReport {
    let evaluation = evaluate(snapshot, catalog, groups, horizons, config);
    let suggestions = suggest(
        snapshot,
        catalog,
        &evaluation.current_breaches,
        &evaluation.future_breaches,
        config,
    );
    AlertReport {
        generation: 0,
        captured_at_ms: snapshot.captured_at_ms,
        suggestions,
        overview: overview(snapshot, catalog, peak),
        status_board: status_board(snapshot, catalog, config.approaching_threshold_ratio),
        outlook: MovementOutlook {
            headings: heading_summary(groups),
            next_step_inflow: predicted_inflow(groups),
        },
        evaluation,
    }
}
