//! The monitor: two independent timers around one shared state.
//!
//! - The **sampler** polls the source every `pollIntervalSecs`, validates
//!   the raw counts into a fresh snapshot, publishes it, and evaluates.
//! - The **ticker** advances every movement group once per `tickMinutes`.
//!   It never waits on the source, so a slow fetch cannot delay it.
//!
//! Evaluations always run over a captured copy of the inputs. A result whose
//! generation is older than the published report is dropped.

use std::sync::Arc;
use std::time::Duration;

use crowdwatch_logic::config::{ConfigError, EngineConfig};
use crowdwatch_logic::flow::MovementGroup;
use crowdwatch_logic::report::{build_report, AlertReport};
use crowdwatch_logic::snapshot::{now_ms, OccupancySnapshot, RejectedEntry};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::source::{OccupancySource, SourceError};
use crate::state::SharedState;

/// What one successful poll produced.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub generation: u64,
    pub rejected: Vec<RejectedEntry>,
    pub report: Arc<AlertReport>,
    /// False if a newer report was already published when this one finished.
    pub published: bool,
}

pub struct Monitor {
    config: EngineConfig,
    horizons: Vec<u32>,
    source: Arc<dyn OccupancySource>,
    state: Arc<SharedState>,
}

impl Monitor {
    /// Fails if `config` does not validate; both timer periods must be non-zero.
    pub fn new(
        config: EngineConfig,
        groups: Vec<MovementGroup>,
        source: Arc<dyn OccupancySource>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let horizons = config.default_horizons_minutes.clone();
        Ok(Self {
            config,
            horizons,
            source,
            state: Arc::new(SharedState::new(groups)),
        })
    }

    /// Evaluate these horizons instead of the configured defaults.
    pub fn with_horizons(mut self, horizons: Vec<u32>) -> Self {
        self.horizons = horizons;
        self
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.config.tick_minutes as u64 * 60)
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.config.poll_interval_secs)
    }

    /// Fetch, validate, publish, and evaluate once.
    pub async fn poll_once(&self) -> Result<PollOutcome, SourceError> {
        let raw = self.source.fetch_counts().await?;
        let catalog = self.source.fetch_limits().await?;

        let ingested = OccupancySnapshot::from_raw(&raw, now_ms());
        for entry in &ingested.rejected {
            log::warn!(
                "dropping zone '{}' from snapshot: {:?}",
                entry.zone,
                entry.reason
            );
        }

        let generation = self.state.publish_snapshot(ingested.snapshot, catalog);
        log::debug!("published snapshot gen={}", generation);

        let (report, published) = self.evaluate_now();
        Ok(PollOutcome {
            generation,
            rejected: ingested.rejected,
            report,
            published,
        })
    }

    /// Evaluate the currently published inputs and try to publish the result.
    pub fn evaluate_now(&self) -> (Arc<AlertReport>, bool) {
        let inputs = self.state.capture();
        let mut report = {
            let mut peak = self.state.peak().lock();
            build_report(
                &inputs.snapshot,
                &inputs.catalog,
                &inputs.groups,
                &self.horizons,
                &self.config,
                &mut peak,
            )
        };
        report.generation = inputs.generation;

        if !report.evaluation.current_breaches.is_empty() {
            log::info!(
                "gen={} current breaches: {}",
                report.generation,
                report
                    .evaluation
                    .current_breaches
                    .iter()
                    .map(|b| format!("{} {}/{}", b.zone, b.count, b.limit))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        if !report.evaluation.future_breaches.is_empty() {
            log::info!(
                "gen={} predicted breaches: {}",
                report.generation,
                report.evaluation.future_breaches.len()
            );
        }

        let published = self.state.store_report(report.clone());
        (Arc::new(report), published)
    }

    /// Start the sampler and ticker tasks on the current tokio runtime.
    pub fn spawn(self: Arc<Self>) -> MonitorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sampler = tokio::spawn(run_sampler(self.clone(), shutdown_rx.clone()));
        let ticker = tokio::spawn(run_ticker(self, shutdown_rx));
        MonitorHandle {
            shutdown: shutdown_tx,
            tasks: vec![sampler, ticker],
        }
    }
}

/// Running monitor tasks.
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Signal both tasks to stop and wait for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(err) = task.await {
                log::warn!("monitor task ended abnormally: {}", err);
            }
        }
    }
}

async fn run_sampler(monitor: Arc<Monitor>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(monitor.poll_period());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    log::info!("sampler started, polling every {:?}", monitor.poll_period());

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }
        // A fetch that never returns must not hold up shutdown.
        let result = tokio::select! {
            result = monitor.poll_once() => result,
            _ = shutdown.changed() => break,
        };
        match result {
            Ok(outcome) => log::debug!(
                "poll gen={} rejected={} published={}",
                outcome.generation,
                outcome.rejected.len(),
                outcome.published
            ),
            Err(err) => log::warn!("poll failed, keeping previous snapshot: {}", err),
        }
    }
    log::info!("sampler stopped");
}

async fn run_ticker(monitor: Arc<Monitor>, mut shutdown: watch::Receiver<bool>) {
    let period = monitor.tick_period();
    // First advance happens one full tick after start.
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    log::info!("group ticker started, advancing every {:?}", period);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }
        let generation = monitor.state.advance_groups();
        log::debug!("groups advanced gen={}", generation);
    }
    log::info!("group ticker stopped");
}
