//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Append-only on-disk equipment store."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use fleetsim_sim::{ChannelKind, ChannelReading, ChannelReadings, Equipment};
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::event_log::{replay, EventLogWriter};
use crate::metrics::PersistenceMetrics;
use crate::model::{EquipmentRow, ReadingRow};
use crate::store::EquipmentStore;
use crate::{PersistenceError, Result};

const EQUIPMENT_LOG: &str = "equipment.log";
const READINGS_LOG: &str = "readings.log";
const EQUIPMENT_KIND: &str = "equipment";
const READING_KIND: &str = "reading";

struct Logs {
    equipment: EventLogWriter,
    readings: EventLogWriter,
    known: HashSet<String>,
}

/// Store backed by two append-only logs in one directory: `equipment.log`
/// holds provisioned units and `readings.log` every channel value ever written.
pub struct EventLogStore {
    root: PathBuf,
    logs: Mutex<Logs>,
    metrics: Option<Arc<PersistenceMetrics>>,
}

impl EventLogStore {
    /// Open or create the store under `root`.
    pub fn open(root: impl Into<PathBuf>, metrics: Option<Arc<PersistenceMetrics>>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|err| {
            PersistenceError::Storage(format!(
                "unable to create store directory {}: {err}",
                root.display()
            ))
        })?;
        let equipment_path = root.join(EQUIPMENT_LOG);
        let readings_path = root.join(READINGS_LOG);

        let mut known = HashSet::new();
        replay::<EquipmentRow, _>(&equipment_path, EQUIPMENT_KIND, |entry| {
            known.insert(entry.record.equipment_id);
            Ok(())
        })?;

        let equipment = EventLogWriter::open(&equipment_path, EQUIPMENT_KIND)?;
        let readings = EventLogWriter::open(&readings_path, READING_KIND)?;
        info!(
            root = %root.display(),
            equipment = known.len(),
            readings = readings.last_sequence(),
            "event-log store opened"
        );

        Ok(Self {
            root,
            logs: Mutex::new(Logs {
                equipment,
                readings,
                known,
            }),
            metrics,
        })
    }

    fn record_append(&self, log: &str, bytes: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.record_append(log, bytes);
        }
    }
}

impl std::fmt::Debug for EventLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EquipmentStore for EventLogStore {
    fn backend(&self) -> &'static str {
        "event-log"
    }

    async fn load_equipment(&self, max_count: usize) -> Result<Vec<Equipment>> {
        let started = Instant::now();
        // Held so no append lands between the two replays.
        let _logs = self.logs.lock();

        let mut rows: Vec<EquipmentRow> = Vec::new();
        replay::<EquipmentRow, _>(&self.root.join(EQUIPMENT_LOG), EQUIPMENT_KIND, |entry| {
            if rows.len() < max_count {
                rows.push(entry.record);
            }
            Ok(())
        })?;

        let wanted: HashSet<&str> = rows.iter().map(|row| row.equipment_id.as_str()).collect();
        let mut latest: HashMap<(String, ChannelKind), ReadingRow> = HashMap::new();
        replay::<ReadingRow, _>(&self.root.join(READINGS_LOG), READING_KIND, |entry| {
            let row = entry.record;
            if !wanted.contains(row.equipment_id.as_str()) {
                return Ok(());
            }
            let key = (row.equipment_id.clone(), row.channel);
            match latest.get(&key) {
                Some(current) if current.timestamp > row.timestamp => {}
                _ => {
                    latest.insert(key, row);
                }
            }
            Ok(())
        })?;

        let mut loaded = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = row.to_record()?;
            let reading = |kind: ChannelKind| -> Result<ChannelReading> {
                latest
                    .get(&(row.equipment_id.clone(), kind))
                    .ok_or_else(|| {
                        PersistenceError::Storage(format!(
                            "equipment {} has no {kind} reading",
                            row.equipment_id
                        ))
                    })?
                    .to_reading()
            };
            let readings = ChannelReadings {
                fuel_level: reading(ChannelKind::FuelLevel)?,
                oil_pressure: reading(ChannelKind::OilPressure)?,
                oil_engine_temperature: reading(ChannelKind::OilEngineTemperature)?,
                transmission_oil_temperature: reading(ChannelKind::TransmissionOilTemperature)?,
            };
            loaded.push(Equipment::new(record, readings));
        }

        if let Some(metrics) = &self.metrics {
            metrics.observe_load(started.elapsed().as_secs_f64());
        }
        debug!(requested = max_count, loaded = loaded.len(), "equipment loaded from event log");
        Ok(loaded)
    }

    async fn insert_channel_reading(
        &self,
        kind: ChannelKind,
        reading: &ChannelReading,
        equipment_id: Uuid,
    ) -> Result<()> {
        let row = ReadingRow::new(kind, reading, equipment_id);
        let bytes = {
            let mut logs = self.logs.lock();
            if !logs.known.contains(&row.equipment_id) {
                return Err(PersistenceError::UnknownEquipment { equipment_id });
            }
            logs.readings.append(&row)?.1
        };
        self.record_append(READING_KIND, bytes);
        Ok(())
    }

    async fn write_equipment_and_readings(&self, equipment: &Equipment) -> Result<()> {
        let row = EquipmentRow::from(&equipment.record);
        let mut appended = Vec::with_capacity(5);
        {
            let mut logs = self.logs.lock();
            if logs.known.contains(&row.equipment_id) {
                return Err(PersistenceError::Duplicate {
                    equipment_id: equipment.id(),
                    equipment_name: equipment.name().to_owned(),
                });
            }
            // A unit becomes loadable only after all of its readings are on disk.
            for (kind, reading) in equipment.readings.iter() {
                let reading_row = ReadingRow::new(kind, reading, equipment.id());
                appended.push((READING_KIND, logs.readings.append(&reading_row)?.1));
            }
            appended.push((EQUIPMENT_KIND, logs.equipment.append(&row)?.1));
            logs.known.insert(row.equipment_id.clone());
        }
        for (log, bytes) in appended {
            self.record_append(log, bytes);
        }
        info!(
            equipment_id = %equipment.id(),
            equipment_name = %equipment.name(),
            "equipment provisioned"
        );
        Ok(())
    }
}
