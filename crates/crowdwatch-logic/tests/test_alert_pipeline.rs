//! Integration tests for the full alerting pipeline.
//!
//! Exercises: VenueConfig → OccupancySnapshot → evaluate → suggest → report
//!
//! All tests are pure logic with no polling and no runtime.

use crowdwatch_logic::advisor::{suggest, Priority, SuggestionKind};
use crowdwatch_logic::alerts::evaluate;
use crowdwatch_logic::classify::{classify_snapshot, Status};
use crowdwatch_logic::config::{EngineConfig, VenueConfig};
use crowdwatch_logic::flow::{advance_all, project, project_with_positions, MovementGroup};
use crowdwatch_logic::overview::PeakTracker;
use crowdwatch_logic::report::build_report;
use crowdwatch_logic::snapshot::OccupancySnapshot;
use crowdwatch_logic::zones::density_points;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const VENUE_JSON: &str = include_str!("../../../data/venue.json");

// ── Helpers ────────────────────────────────────────────────────────────

fn venue() -> VenueConfig {
    VenueConfig::from_json_str(VENUE_JSON).expect("bundled venue parses")
}

fn random_snapshot(rng: &mut StdRng, zones: &[&str]) -> OccupancySnapshot {
    OccupancySnapshot::from_counts(zones.iter().map(|z| (*z, rng.gen_range(0..60u32))))
}

fn random_groups(rng: &mut StdRng, zones: &[&str]) -> Vec<MovementGroup> {
    (0..rng.gen_range(0..6))
        .map(|i| {
            let len = rng.gen_range(1..5);
            let path: Vec<&str> = (0..len)
                .map(|_| zones[rng.gen_range(0..zones.len())])
                .collect();
            MovementGroup::new(format!("g{i}"), path, rng.gen_range(0..25))
                .at(rng.gen_range(0..8))
        })
        .collect()
}

// ── Bundled venue ──────────────────────────────────────────────────────

#[test]
fn bundled_venue_loads() {
    let venue = venue();
    let config = EngineConfig::default();
    assert_eq!(venue.zones.len(), 6);
    let groups = venue.movement_groups(&config);
    assert_eq!(groups.len(), 5);
    assert!(groups.iter().all(|g| g.transfer == 10 && g.position == 0));
}

#[test]
fn quiet_venue_raises_nothing() {
    let venue = venue();
    let config = EngineConfig::default();
    let snapshot =
        OccupancySnapshot::from_counts([("A", 20), ("B", 20), ("C", 20), ("D", 20), ("E", 20), ("F", 20)]);
    let eval = evaluate(
        &snapshot,
        &venue.catalog(),
        &venue.movement_groups(&config),
        &config.default_horizons_minutes,
        &config,
    );
    assert!(!eval.has_breaches());
    assert!(suggest(&snapshot, &venue.catalog(), &[], &[], &config).is_empty());
}

#[test]
fn crowded_venue_end_to_end() {
    let venue = venue();
    let config = EngineConfig::default();
    let catalog = venue.catalog();
    let groups = venue.movement_groups(&config);
    let snapshot = OccupancySnapshot::from_counts([
        ("A", 175),
        ("B", 160),
        ("C", 30),
        ("D", 40),
        ("E", 50),
        ("F", 85),
    ])
    .at(1_700_000_000_000);

    let eval = evaluate(&snapshot, &catalog, &groups, &[5, 10], &config);
    let current: Vec<&str> = eval.current_breaches.iter().map(|b| b.zone.as_str()).collect();
    assert_eq!(current, vec!["B"]);
    let predicted: Vec<(&str, u32)> = eval
        .future_breaches
        .iter()
        .filter_map(|b| Some((b.zone.as_str(), b.horizon?.minutes)))
        .collect();
    // B stays over its limit; A tips over once Groups 1 and 2 walk back into it.
    assert_eq!(predicted, vec![("B", 5), ("A", 10), ("B", 10)]);

    let suggestions = suggest(
        &snapshot,
        &catalog,
        &eval.current_breaches,
        &eval.future_breaches,
        &config,
    );
    assert_eq!(suggestions.len(), 1);
    let s = &suggestions[0];
    assert_eq!(s.kind, SuggestionKind::Immediate);
    assert_eq!(s.priority, Priority::High);
    assert_eq!(s.excess_people, Some(10));
    let targets: Vec<&str> = s.recommendations.iter().map(|c| c.zone.as_str()).collect();
    // D has 160 free, C has 90, E has 50.
    assert_eq!(targets, vec!["D", "C"]);
}

#[test]
fn report_matches_individual_stages() {
    let venue = venue();
    let config = EngineConfig::default();
    let catalog = venue.catalog();
    let groups = venue.movement_groups(&config);
    let snapshot = OccupancySnapshot::from_counts([("A", 190), ("B", 10), ("C", 10)]);

    let mut peak = PeakTracker::new();
    let report = build_report(
        &snapshot,
        &catalog,
        &groups,
        &config.default_horizons_minutes,
        &config,
        &mut peak,
    );
    let eval = evaluate(&snapshot, &catalog, &groups, &config.default_horizons_minutes, &config);
    assert_eq!(report.evaluation, eval);
    assert_eq!(report.overview.total_population, 210);
    assert_eq!(report.status_board.breached.len(), 1);
    assert_eq!(density_points(&snapshot, &catalog).len(), 3);
}

#[test]
fn caller_advanced_positions_match_projection() {
    let venue = venue();
    let config = EngineConfig::default();
    let groups = venue.movement_groups(&config);
    let snapshot = OccupancySnapshot::from_counts([("A", 50), ("C", 50), ("E", 50), ("D", 50), ("F", 50)]);

    let projection = project_with_positions(&snapshot, &groups, 15, config.tick_minutes);
    let advanced = advance_all(&advance_all(&advance_all(&groups)));
    let positions: Vec<usize> = advanced.iter().map(|g| g.position).collect();
    assert_eq!(projection.positions, positions);

    // Projecting 5 minutes from the advanced groups continues the same trajectory.
    let stepwise = project(&projection.snapshot, &advanced, 5, config.tick_minutes);
    let direct = project(&snapshot, &groups, 20, config.tick_minutes);
    assert_eq!(stepwise, direct);
}

// ── Invariant sweeps ───────────────────────────────────────────────────

#[test]
fn projection_never_negative_and_conserves_population() {
    let zones = ["A", "B", "C", "D", "E"];
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..500 {
        let snapshot = random_snapshot(&mut rng, &zones);
        let groups = random_groups(&mut rng, &zones);
        let horizon = rng.gen_range(0..120);
        let projected = project(&snapshot, &groups, horizon, 5);
        // u32 counts cannot be negative; conservation proves nothing was
        // clamped away to keep them that way.
        assert_eq!(projected.total(), snapshot.total());
        for zone in snapshot.zones() {
            assert!(projected.contains(zone));
        }
    }
}

#[test]
fn projection_ignores_group_order() {
    let zones = ["A", "B", "C", "D"];
    let mut rng = StdRng::seed_from_u64(1234);
    for _ in 0..300 {
        // Small counts so groups regularly compete for the same source.
        let snapshot = OccupancySnapshot::from_counts(zones.iter().map(|z| (*z, rng.gen_range(0..30u32))));
        let groups = random_groups(&mut rng, &zones);
        let mut shuffled = groups.clone();
        shuffled.shuffle(&mut rng);
        let horizon = rng.gen_range(0..60);
        assert_eq!(
            project(&snapshot, &shuffled, horizon, 5),
            project(&snapshot, &groups, horizon, 5)
        );
    }
}

#[test]
fn zero_horizon_is_identity() {
    let zones = ["A", "B", "C"];
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..100 {
        let snapshot = random_snapshot(&mut rng, &zones);
        let groups = random_groups(&mut rng, &zones);
        assert_eq!(project(&snapshot, &groups, 0, 5), snapshot);
    }
}

#[test]
fn evaluation_is_deterministic() {
    let venue = venue();
    let config = EngineConfig::default();
    let catalog = venue.catalog();
    let groups = venue.movement_groups(&config);
    let zones = ["A", "B", "C", "D", "E", "F"];
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..50 {
        let snapshot = OccupancySnapshot::from_counts(
            zones.iter().map(|z| (*z, rng.gen_range(0..250u32))),
        );
        let first = evaluate(&snapshot, &catalog, &groups, &[5, 10, 25], &config);
        let second = evaluate(&snapshot, &catalog, &groups, &[5, 10, 25], &config);
        assert_eq!(first, second);

        for breach in &first.current_breaches {
            assert!(breach.count >= breach.limit);
        }
        let statuses = classify_snapshot(&snapshot, &catalog, config.approaching_threshold_ratio);
        let breached = statuses.iter().filter(|s| s.status == Status::Breached).count();
        assert_eq!(breached, first.current_breaches.len());
    }
}

#[test]
fn suggestions_never_self_target() {
    let venue = venue();
    let config = EngineConfig::default();
    let catalog = venue.catalog();
    let groups = venue.movement_groups(&config);
    let zones = ["A", "B", "C", "D", "E", "F"];
    let mut rng = StdRng::seed_from_u64(1234);
    for _ in 0..200 {
        let snapshot = OccupancySnapshot::from_counts(
            zones.iter().map(|z| (*z, rng.gen_range(0..250u32))),
        );
        let eval = evaluate(&snapshot, &catalog, &groups, &[5, 10], &config);
        let suggestions = suggest(
            &snapshot,
            &catalog,
            &eval.current_breaches,
            &eval.future_breaches,
            &config,
        );
        for s in &suggestions {
            assert!(s.recommendations.len() <= config.max_suggestions_per_breach);
            assert!(s.recommendations.iter().all(|c| c.zone != s.from_zone));
            assert!(s
                .recommendations
                .windows(2)
                .all(|w| w[0].available_capacity >= w[1].available_capacity));
        }
    }
}
