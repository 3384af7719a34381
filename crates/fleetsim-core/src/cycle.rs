//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Per-tick equipment update cycle."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fleetsim_common::metrics::{JitterSummary, LoopTimingReporter};
use fleetsim_common::time::jitter_us;
use fleetsim_metrics::CycleMetrics;
use fleetsim_persistence::EquipmentStore;
use fleetsim_rt::RateLimiter;
use fleetsim_sim::{PulseCurve, WorkingSet};
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    /// Units the curve asked for before clamping to the working-set size.
    pub requested: u64,
    pub touched: usize,
    pub written: usize,
    pub failed: usize,
}

/// Totals handed back when the cycle stops.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleSummary {
    pub ticks: u64,
    pub touched: u64,
    pub written: u64,
    pub failed: u64,
    pub jitter: Option<JitterSummary>,
}

impl CycleSummary {
    fn absorb(&mut self, report: &TickReport) {
        self.ticks += 1;
        self.touched += report.touched as u64;
        self.written += report.written as u64;
        self.failed += report.failed as u64;
    }
}

/// Owns the working set and advances it once per tick.
pub struct UpdateCycle {
    working_set: WorkingSet,
    curve: PulseCurve,
    rng: StdRng,
    store: Arc<dyn EquipmentStore>,
    tick: u64,
    summary: CycleSummary,
    timing: LoopTimingReporter,
    metrics: Option<CycleMetrics>,
}

impl UpdateCycle {
    pub fn new(
        working_set: WorkingSet,
        curve: PulseCurve,
        store: Arc<dyn EquipmentStore>,
        rng: StdRng,
        period: Duration,
    ) -> Self {
        Self {
            working_set,
            curve,
            rng,
            store,
            tick: 0,
            summary: CycleSummary::default(),
            timing: LoopTimingReporter::new(period),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: CycleMetrics) -> Self {
        metrics.set_working_set_size(self.working_set.len());
        self.metrics = Some(metrics);
        self
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn summary(&self) -> &CycleSummary {
        &self.summary
    }

    /// Advance the curve by one tick, walk the selected prefix, and push every
    /// moved reading to the store. A refused reading is logged and counted; the
    /// remaining readings of the tick are still sent.
    pub async fn run_tick(&mut self) -> TickReport {
        self.tick += 1;
        let tick = self.tick;
        let requested = self.curve.value(tick);
        let touched = self
            .working_set
            .advance(requested, Utc::now(), &mut self.rng);

        let mut written = 0usize;
        let mut failed = 0usize;
        for unit in &touched {
            for (channel, reading) in unit.readings.iter() {
                match self
                    .store
                    .insert_channel_reading(channel, reading, unit.equipment_id)
                    .await
                {
                    Ok(()) => {
                        written += 1;
                        if let Some(metrics) = &self.metrics {
                            metrics.record_written(channel);
                        }
                        debug!(
                            tick,
                            equipment_id = %unit.equipment_id,
                            equipment_name = %unit.equipment_name,
                            channel = %channel,
                            value = reading.value,
                            "reading written"
                        );
                    }
                    Err(err) => {
                        failed += 1;
                        if let Some(metrics) = &self.metrics {
                            metrics.record_failure(channel);
                        }
                        warn!(
                            tick,
                            equipment_id = %unit.equipment_id,
                            channel = %channel,
                            error = %err,
                            "failed to write reading"
                        );
                    }
                }
            }
        }

        let report = TickReport {
            tick,
            requested,
            touched: touched.len(),
            written,
            failed,
        };
        self.summary.absorb(&report);
        if let Some(metrics) = &self.metrics {
            metrics.record_tick(requested, report.touched);
        }
        report
    }

    /// Tick on `limiter` until `shutdown` fires or `max_ticks` ticks have run.
    /// A tick that has started always finishes before the shutdown is seen.
    pub async fn run(
        mut self,
        mut limiter: RateLimiter,
        mut shutdown: broadcast::Receiver<()>,
        max_ticks: Option<u64>,
    ) -> CycleSummary {
        info!(
            period_ms = limiter.period().as_millis() as u64,
            working_set = self.working_set.len(),
            freq = self.curve.freq(),
            max_peak = self.curve.max_peak(),
            "update cycle started"
        );
        loop {
            if max_ticks.is_some_and(|limit| self.tick >= limit) {
                info!(ticks = self.tick, "tick limit reached");
                break;
            }
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!(ticks = self.tick, "update cycle shutdown signal received");
                    break;
                }
                instant = limiter.tick() => {
                    let now = tokio::time::Instant::now();
                    self.timing.record_tick_at(now.into_std());
                    let lateness = now.saturating_duration_since(instant);
                    let report = self.run_tick().await;
                    info!(
                        tick = report.tick,
                        requested = report.requested,
                        touched = report.touched,
                        written = report.written,
                        failed = report.failed,
                        late_us = jitter_us(lateness, Duration::ZERO),
                        "tick complete"
                    );
                }
            }
        }

        let mut summary = self.summary;
        summary.jitter = self.timing.histogram().summary();
        info!(
            ticks = summary.ticks,
            written = summary.written,
            failed = summary.failed,
            "update cycle stopped"
        );
        summary
    }
}

impl std::fmt::Debug for UpdateCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateCycle")
            .field("tick", &self.tick)
            .field("working_set", &self.working_set.len())
            .field("curve", &self.curve)
            .field("backend", &self.store.backend())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration};
    use fleetsim_persistence::{MemoryStore, PersistenceError, Result as StoreResult};
    use fleetsim_sim::{ChannelKind, ChannelReading, Equipment, EquipmentRecord};
    use rand::SeedableRng;
    use uuid::Uuid;

    fn fleet(size: usize, at: DateTime<Utc>) -> Vec<Equipment> {
        (0..size)
            .map(|i| {
                Equipment::provision(
                    EquipmentRecord {
                        equipment_id: Uuid::new_v4(),
                        equipment_name: format!("truck-{i}"),
                        equipment_type: "haul_truck".into(),
                        manufacturer: "Liebherr".into(),
                        model: "T 284".into(),
                        production_year: 2018,
                        location: "pit-south".into(),
                    },
                    at,
                )
            })
            .collect()
    }

    async fn seeded_memory_store(units: &[Equipment]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for unit in units {
            store.write_equipment_and_readings(unit).await.unwrap();
        }
        store
    }

    fn cycle(units: Vec<Equipment>, curve: PulseCurve, store: Arc<dyn EquipmentStore>) -> UpdateCycle {
        UpdateCycle::new(
            WorkingSet::new(units),
            curve,
            store,
            StdRng::seed_from_u64(7),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn only_the_prefix_moves() {
        let then = Utc::now() - ChronoDuration::hours(1);
        let units = fleet(5, then);
        let store = seeded_memory_store(&units).await;
        // freq 1 keeps the phase at zero, which asks for 2 of 30.
        let curve = PulseCurve::new(1, 30);
        let requested = curve.value(1);
        assert_eq!(requested, 2);

        let mut cycle = cycle(units.clone(), curve, store.clone());
        let report = cycle.run_tick().await;
        assert_eq!(report.tick, 1);
        assert_eq!(report.touched, 2);
        assert_eq!(report.written, 8);
        assert_eq!(report.failed, 0);

        for (index, original) in units.iter().enumerate() {
            let current = cycle.working_set().get(index).unwrap();
            for kind in ChannelKind::ALL {
                let profile = kind.profile();
                let reading = current.readings.get(kind);
                assert!(profile.admits(reading.value));
                assert_eq!(reading.reading_id, original.readings.get(kind).reading_id);
                if index < 2 {
                    assert!(reading.timestamp > then);
                } else {
                    assert_eq!(reading, original.readings.get(kind));
                }
            }
        }
        assert_eq!(store.reading_count(), 5 * 4 + 8);
    }

    #[tokio::test]
    async fn oversized_request_touches_every_unit() {
        let units = fleet(3, Utc::now());
        let store = seeded_memory_store(&units).await;
        let mut cycle = cycle(units, PulseCurve::new(7, 100), store);
        let report = cycle.run_tick().await;
        assert!(report.requested > 3);
        assert_eq!(report.touched, 3);
        assert_eq!(report.written, 12);
    }

    #[tokio::test]
    async fn empty_working_set_ticks_without_writes() {
        let store = Arc::new(MemoryStore::new());
        let mut cycle = cycle(Vec::new(), PulseCurve::new(7, 10), store);
        let report = cycle.run_tick().await;
        assert_eq!(report.touched, 0);
        assert_eq!(report.written, 0);
        assert_eq!(cycle.ticks(), 1);
    }

    /// Accepts everything except oil pressure readings.
    struct PressureRejectingStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl EquipmentStore for PressureRejectingStore {
        fn backend(&self) -> &'static str {
            "pressure-rejecting"
        }

        async fn load_equipment(&self, max_count: usize) -> StoreResult<Vec<Equipment>> {
            self.inner.load_equipment(max_count).await
        }

        async fn insert_channel_reading(
            &self,
            kind: ChannelKind,
            reading: &ChannelReading,
            equipment_id: Uuid,
        ) -> StoreResult<()> {
            if kind == ChannelKind::OilPressure {
                return Err(PersistenceError::Storage("pressure table offline".into()));
            }
            self.inner
                .insert_channel_reading(kind, reading, equipment_id)
                .await
        }

        async fn write_equipment_and_readings(&self, equipment: &Equipment) -> StoreResult<()> {
            self.inner.write_equipment_and_readings(equipment).await
        }
    }

    #[tokio::test]
    async fn failing_channel_does_not_block_the_others() {
        let units = fleet(2, Utc::now());
        let store = Arc::new(PressureRejectingStore {
            inner: MemoryStore::new(),
        });
        for unit in &units {
            store.write_equipment_and_readings(unit).await.unwrap();
        }
        let ids: Vec<Uuid> = units.iter().map(Equipment::id).collect();

        let mut cycle = cycle(units, PulseCurve::new(1, 30), store.clone());
        let first = cycle.run_tick().await;
        assert_eq!(first.touched, 2);
        assert_eq!(first.written, 6);
        assert_eq!(first.failed, 2);

        let second = cycle.run_tick().await;
        assert_eq!(second.tick, 2);
        assert_eq!(second.failed, 2);
        assert_eq!(cycle.summary().written, 12);
        assert_eq!(cycle.summary().failed, 4);

        for id in ids {
            let rows = store.inner.readings_for(id);
            let pressure_rows = rows
                .iter()
                .filter(|row| row.channel == ChannelKind::OilPressure)
                .count();
            assert_eq!(pressure_rows, 1);
            assert_eq!(rows.len(), 4 + 2 * 3);
        }
    }
}
