//! Pure crowd-occupancy logic for CrowdWatch.
//!
//! This crate contains the monitoring engine independent of any transport,
//! runtime, or UI. Functions take plain data (a snapshot, a zone catalog,
//! movement groups) and return results, so every rule is unit-testable
//! without a polling loop or a dashboard.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`advisor`] | Redistribution suggestions ranked by free capacity |
//! | [`alerts`] | Current and predicted breach evaluation per horizon |
//! | [`classify`] | Safe / approaching / breached status and display bands |
//! | [`config`] | Engine thresholds and venue (zones + groups) definitions |
//! | [`flow`] | Cyclic movement-group projection of future occupancy |
//! | [`overview`] | Total population, alerting zones, peak occupancy |
//! | [`report`] | One-call pipeline producing the dashboard payload |
//! | [`snapshot`] | Immutable occupancy snapshots and raw-count ingestion |
//! | [`zones`] | Zone catalog, safe limits, map geometry |

pub mod advisor;
pub mod alerts;
pub mod classify;
pub mod config;
pub mod flow;
pub mod overview;
pub mod report;
pub mod snapshot;
pub mod zones;
