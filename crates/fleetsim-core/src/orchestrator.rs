//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Primary orchestration and lifecycle management."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fleetsim_common::config::AppConfig;
use fleetsim_common::time::period_from_secs;
use fleetsim_metrics::{CycleMetrics, SharedRegistry};
use fleetsim_persistence::EquipmentStore;
use fleetsim_rt::RateLimiter;
use fleetsim_sim::PulseCurve;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::cycle::{CycleSummary, UpdateCycle};
use crate::service::FleetService;

/// Loads the working set and drives the update cycle on its own task.
pub struct Simulator {
    config: Arc<AppConfig>,
    store: Arc<dyn EquipmentStore>,
    metrics_registry: Option<SharedRegistry>,
}

impl Simulator {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn EquipmentStore>,
        metrics: Option<SharedRegistry>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            metrics_registry: metrics,
        }
    }

    /// Tick period: the explicit millisecond override if set, else `frequency` seconds.
    pub fn period(&self) -> Duration {
        self.config
            .simulation
            .tick_interval
            .filter(|interval| !interval.is_zero())
            .unwrap_or_else(|| period_from_secs(self.config.frequency.effective_frequency()))
    }

    /// Load the working set and arm the ticker. A store that cannot serve the
    /// initial load fails the start and nothing is scheduled.
    pub async fn start(self) -> Result<SimulatorHandle> {
        let service = FleetService::new(self.store.clone());
        let cap = self.config.equipment_cap();
        let working_set = service
            .load_working_set(cap, self.config.simulation.reset_on_load)
            .await
            .with_context(|| {
                format!(
                    "failed to load the working set from the {} store",
                    self.store.backend()
                )
            })?;

        let frequency = self.config.frequency.effective_frequency();
        let max_peak = self.config.frequency.effective_max_peak();
        let curve = PulseCurve::new(frequency, max_peak);
        let rng = match self.config.simulation.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let period = self.period();
        let working_set_size = working_set.len();

        let mut cycle = UpdateCycle::new(working_set, curve, self.store.clone(), rng, period);
        if let Some(registry) = &self.metrics_registry {
            cycle = cycle.with_metrics(CycleMetrics::new(registry.clone())?);
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
        let limiter = RateLimiter::new(period);
        let max_ticks = self.config.simulation.max_ticks;
        let task = tokio::spawn(cycle.run(limiter, shutdown_rx, max_ticks));

        info!(
            backend = self.store.backend(),
            working_set = working_set_size,
            frequency,
            max_peak,
            period_ms = period.as_millis() as u64,
            max_ticks = ?max_ticks,
            seeded = self.config.simulation.seed.is_some(),
            "simulator started"
        );

        Ok(SimulatorHandle {
            shutdown: shutdown_tx,
            task: Some(task),
            summary: None,
            period,
            working_set_size,
            config: self.config,
        })
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("backend", &self.store.backend())
            .field("metrics", &self.metrics_registry.is_some())
            .finish_non_exhaustive()
    }
}

/// Handle returned from [`Simulator::start`] for lifecycle control.
#[derive(Debug)]
pub struct SimulatorHandle {
    shutdown: broadcast::Sender<()>,
    task: Option<JoinHandle<CycleSummary>>,
    summary: Option<CycleSummary>,
    period: Duration,
    working_set_size: usize,
    config: Arc<AppConfig>,
}

impl SimulatorHandle {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn working_set_size(&self) -> usize {
        self.working_set_size
    }

    /// Resolve once the cycle stops on its own, which only happens when a tick
    /// limit is configured. Safe to use as a `select!` branch.
    pub async fn finished(&mut self) -> Result<()> {
        if let Some(task) = self.task.as_mut() {
            let summary = task.await.context("update cycle task failed")?;
            self.task = None;
            self.summary = Some(summary);
        }
        Ok(())
    }

    /// Stop ticking after the current tick and return the cycle totals.
    pub async fn shutdown(mut self) -> Result<CycleSummary> {
        let _ = self.shutdown.send(());
        if let Err(err) = self.finished().await {
            error!(error = %err, "update cycle task join error");
            return Err(err);
        }
        let summary = self.summary.take().unwrap_or_default();
        info!(
            ticks = summary.ticks,
            written = summary.written,
            failed = summary.failed,
            "simulator shutdown complete"
        );
        Ok(summary)
    }
}
