//! Redistribution advice: where to send people from crowded zones.
//!
//! Candidate destinations are zones whose current utilization sits below
//! the configured ceiling (70% by default), ranked by free capacity. Every
//! live breach gets an `Immediate` suggestion. Only when nothing is breached
//! right now do predicted breaches get `Preventive` suggestions, one per
//! distinct zone.
//!
//! Absence of candidates is a normal outcome: the suggestion is still
//! produced, with an empty recommendation list.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::alerts::BreachRecord;
use crate::config::EngineConfig;
use crate::snapshot::OccupancySnapshot;
use crate::zones::ZoneCatalog;

/// A zone able to absorb overflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub zone: String,
    pub count: u32,
    pub limit: u32,
    pub available_capacity: u32,
    pub utilization_percent: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestionKind {
    /// Redirect people out of a zone that is breached now.
    Immediate,
    /// Steer arrivals away from a zone predicted to breach.
    Preventive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Medium,
    High,
}

/// Proposed destinations for one crowded zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub priority: Priority,
    pub from_zone: String,
    /// People above the limit; only set for live breaches.
    pub excess_people: Option<u32>,
    /// Best destinations first.
    pub recommendations: Vec<Candidate>,
}

/// Zones below `ceiling` utilization, most free capacity first.
///
/// Ties are broken by zone id so the ranking is reproducible.
pub fn rank_candidates(
    snapshot: &OccupancySnapshot,
    catalog: &ZoneCatalog,
    ceiling: f64,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = snapshot
        .iter()
        .filter_map(|(zone, count)| {
            let limit = catalog.limit(zone)?;
            if (count as f64) >= ceiling * limit as f64 {
                return None;
            }
            Some(Candidate {
                zone: zone.to_string(),
                count,
                limit,
                available_capacity: limit.saturating_sub(count),
                utilization_percent: utilization_percent(count, limit),
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.available_capacity
            .cmp(&a.available_capacity)
            .then_with(|| a.zone.cmp(&b.zone))
    });
    candidates
}

/// `round(100 * count / limit)`, halves rounding up.
fn utilization_percent(count: u32, limit: u32) -> u32 {
    let limit = limit as u64;
    ((count as u64 * 200 + limit) / (limit * 2)) as u32
}

fn pick(candidates: &[Candidate], exclude: &str, max: usize) -> Vec<Candidate> {
    candidates
        .iter()
        .filter(|c| c.zone != exclude)
        .take(max)
        .cloned()
        .collect()
}

/// Build redistribution suggestions for the given breaches.
pub fn suggest(
    snapshot: &OccupancySnapshot,
    catalog: &ZoneCatalog,
    current_breaches: &[BreachRecord],
    future_breaches: &[BreachRecord],
    config: &EngineConfig,
) -> Vec<Suggestion> {
    if current_breaches.is_empty() && future_breaches.is_empty() {
        return Vec::new();
    }

    let candidates = rank_candidates(snapshot, catalog, config.candidate_utilization_ceiling);
    let max = config.max_suggestions_per_breach;

    if !current_breaches.is_empty() {
        return current_breaches
            .iter()
            .map(|breach| Suggestion {
                kind: SuggestionKind::Immediate,
                priority: Priority::High,
                from_zone: breach.zone.clone(),
                excess_people: Some(breach.excess()),
                recommendations: pick(&candidates, &breach.zone, max),
            })
            .collect();
    }

    let mut seen: HashSet<String> = HashSet::new();
    future_breaches
        .iter()
        .filter(|breach| seen.insert(breach.zone.clone()))
        .map(|breach| Suggestion {
            kind: SuggestionKind::Preventive,
            priority: Priority::Medium,
            from_zone: breach.zone.clone(),
            excess_people: None,
            recommendations: pick(&candidates, &breach.zone, max),
        })
        .collect()
}
