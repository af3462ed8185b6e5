//! Polling runtime for CrowdWatch.
//!
//! Wraps the pure engine in `crowdwatch-logic` with the two cadences a live
//! deployment needs: an occupancy poll and a fixed movement-group tick.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`monitor`] | Sampler and ticker tasks, evaluation publishing |
//! | [`source`] | External occupancy source trait and an in-memory source |
//! | [`state`] | Arc-swapped inputs and latest report |

pub mod monitor;
pub mod source;
pub mod state;

pub use monitor::{Monitor, MonitorHandle, PollOutcome};
pub use source::{OccupancySource, SourceError, StaticSource};
pub use state::{Inputs, SharedState};
