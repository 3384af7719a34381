//! ---
//! fleet_section: "15-testing-qa-runbook"
//! fleet_subsection: "integration-tests"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Lifecycle tests for the simulator start, tick, and shutdown path."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleetsim_common::config::AppConfig;
use fleetsim_core::{FleetService, Simulator};
use fleetsim_metrics::{new_registry, CycleMetrics};
use fleetsim_persistence::{
    EquipmentStore, EventLogStore, MemoryStore, PersistenceError, Result as StoreResult,
};
use fleetsim_sim::{ChannelKind, ChannelReading, Equipment};
use uuid::Uuid;

fn unit_json(name: &str) -> String {
    format!(
        r#"{{"equipment_name":"{name}","equipment_type":"excavator","manufacturer":"Hitachi","model":"EX3600","production_year":2016,"location":"bench-2"}}"#
    )
}

async fn provisioned(store: Arc<dyn EquipmentStore>, count: usize) {
    let service = FleetService::new(store);
    for i in 0..count {
        service
            .add_equipment(&unit_json(&format!("excavator-{i}")))
            .await
            .unwrap();
    }
}

fn config(frequency: u64, max_peak: u64, max_ticks: Option<u64>) -> AppConfig {
    let mut config = AppConfig::default();
    config.frequency.frequency = frequency;
    config.frequency.max_peak = max_peak;
    config.simulation.max_ticks = max_ticks;
    config.simulation.seed = Some(42);
    config
}

/// Refuses every load and counts any write that reaches it.
#[derive(Default)]
struct UnreachableStore {
    writes: AtomicUsize,
}

#[async_trait]
impl EquipmentStore for UnreachableStore {
    fn backend(&self) -> &'static str {
        "unreachable"
    }

    async fn load_equipment(&self, _max_count: usize) -> StoreResult<Vec<Equipment>> {
        Err(PersistenceError::Storage("connection refused".into()))
    }

    async fn insert_channel_reading(
        &self,
        _kind: ChannelKind,
        _reading: &ChannelReading,
        _equipment_id: Uuid,
    ) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn write_equipment_and_readings(&self, _equipment: &Equipment) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn unreachable_store_aborts_before_ticking() {
    let store = Arc::new(UnreachableStore::default());
    let err = Simulator::new(config(1, 5, None), store.clone(), None)
        .start()
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("connection refused"));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(store.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn tick_limit_stops_the_cycle() {
    let store = Arc::new(MemoryStore::new());
    provisioned(store.clone(), 3).await;
    let registry = new_registry();

    // freq 1 pins every tick to the start of the pulse: one unit per tick.
    let mut handle = Simulator::new(config(1, 3, Some(4)), store.clone(), Some(registry.clone()))
        .start()
        .await
        .unwrap();
    assert_eq!(handle.working_set_size(), 3);
    assert_eq!(handle.period(), Duration::from_secs(1));

    handle.finished().await.unwrap();
    let summary = handle.shutdown().await.unwrap();
    assert_eq!(summary.ticks, 4);
    assert_eq!(summary.touched, 4);
    assert_eq!(summary.written, 16);
    assert_eq!(summary.failed, 0);
    assert_eq!(store.reading_count(), 3 * 4 + 16);

    // The cycle registered its collectors on the shared registry.
    assert!(CycleMetrics::new(registry).is_err());
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_between_ticks() {
    let store = Arc::new(MemoryStore::new());
    provisioned(store.clone(), 2).await;

    let handle = Simulator::new(config(2, 2, None), store.clone(), None)
        .start()
        .await
        .unwrap();
    // Ticks land at 2s and 4s; the first one only fires a full period after start.
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(store.reading_count(), 2 * 4);
    tokio::time::sleep(Duration::from_millis(3_000)).await;

    let summary = handle.shutdown().await.unwrap();
    assert_eq!(summary.ticks, 2);
    assert_eq!(store.reading_count(), 2 * 4 + summary.written as usize);
}

#[tokio::test(start_paused = true)]
async fn millisecond_override_sets_the_period() {
    let store = Arc::new(MemoryStore::new());
    provisioned(store.clone(), 1).await;
    let mut config = config(60, 1, Some(3));
    config.simulation.tick_interval = Some(Duration::from_millis(250));

    let start = tokio::time::Instant::now();
    let mut handle = Simulator::new(config, store, None).start().await.unwrap();
    assert_eq!(handle.period(), Duration::from_millis(250));
    handle.finished().await.unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(750), "finished after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(1), "finished after {elapsed:?}");
    assert_eq!(handle.shutdown().await.unwrap().ticks, 3);
}

#[tokio::test]
async fn event_log_store_resumes_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store: Arc<dyn EquipmentStore> =
            Arc::new(EventLogStore::open(dir.path(), None).unwrap());
        provisioned(store.clone(), 2).await;
        let mut config = config(1, 2, Some(2));
        config.simulation.tick_interval = Some(Duration::from_millis(5));
        let mut handle = Simulator::new(config, store, None).start().await.unwrap();
        handle.finished().await.unwrap();
        assert_eq!(handle.shutdown().await.unwrap().written, 8);
    }

    let store: Arc<dyn EquipmentStore> = Arc::new(EventLogStore::open(dir.path(), None).unwrap());
    let listed = FleetService::new(store).list(10).await.unwrap();
    assert_eq!(listed.len(), 2);
    for unit in &listed {
        for kind in ChannelKind::ALL {
            assert!(kind.profile().admits(unit.readings.get(kind).value));
        }
    }
}
