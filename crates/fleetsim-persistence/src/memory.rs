//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "In-process equipment store."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use async_trait::async_trait;
use fleetsim_sim::{ChannelKind, ChannelReading, ChannelReadings, Equipment, EquipmentRecord};
use indexmap::IndexMap;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::store::EquipmentStore;
use crate::{PersistenceError, Result};

/// A reading row as kept by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredReading {
    /// Owning unit.
    pub equipment_id: Uuid,
    /// Channel of the value.
    pub channel: ChannelKind,
    /// The appended reading.
    pub reading: ChannelReading,
}

#[derive(Debug, Default)]
struct MemoryState {
    equipment: IndexMap<Uuid, EquipmentRecord>,
    readings: Vec<StoredReading>,
}

/// Store kept entirely in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of provisioned units.
    pub fn equipment_count(&self) -> usize {
        self.state.lock().equipment.len()
    }

    /// Total reading rows, including the provisioning rows.
    pub fn reading_count(&self) -> usize {
        self.state.lock().readings.len()
    }

    /// All rows appended for `equipment_id`, oldest first.
    pub fn readings_for(&self, equipment_id: Uuid) -> Vec<StoredReading> {
        self.state
            .lock()
            .readings
            .iter()
            .filter(|row| row.equipment_id == equipment_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EquipmentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load_equipment(&self, max_count: usize) -> Result<Vec<Equipment>> {
        let state = self.state.lock();
        let mut loaded = Vec::with_capacity(max_count.min(state.equipment.len()));
        for (id, record) in state.equipment.iter().take(max_count) {
            let latest = |kind: ChannelKind| {
                state
                    .readings
                    .iter()
                    .filter(|row| row.equipment_id == *id && row.channel == kind)
                    .fold(None::<&ChannelReading>, |best, row| match best {
                        Some(current) if current.timestamp > row.reading.timestamp => Some(current),
                        _ => Some(&row.reading),
                    })
                    .cloned()
                    .ok_or_else(|| {
                        PersistenceError::Storage(format!("equipment {id} has no {kind} reading"))
                    })
            };
            let readings = ChannelReadings {
                fuel_level: latest(ChannelKind::FuelLevel)?,
                oil_pressure: latest(ChannelKind::OilPressure)?,
                oil_engine_temperature: latest(ChannelKind::OilEngineTemperature)?,
                transmission_oil_temperature: latest(ChannelKind::TransmissionOilTemperature)?,
            };
            loaded.push(Equipment::new(record.clone(), readings));
        }
        Ok(loaded)
    }

    async fn insert_channel_reading(
        &self,
        kind: ChannelKind,
        reading: &ChannelReading,
        equipment_id: Uuid,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if !state.equipment.contains_key(&equipment_id) {
            return Err(PersistenceError::UnknownEquipment { equipment_id });
        }
        state.readings.push(StoredReading {
            equipment_id,
            channel: kind,
            reading: reading.clone(),
        });
        Ok(())
    }

    async fn write_equipment_and_readings(&self, equipment: &Equipment) -> Result<()> {
        let mut state = self.state.lock();
        let id = equipment.id();
        if state.equipment.contains_key(&id) {
            return Err(PersistenceError::Duplicate {
                equipment_id: id,
                equipment_name: equipment.name().to_owned(),
            });
        }
        state.equipment.insert(id, equipment.record.clone());
        for (kind, reading) in equipment.readings.iter() {
            state.readings.push(StoredReading {
                equipment_id: id,
                channel: kind,
                reading: reading.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn unit(name: &str) -> Equipment {
        Equipment::provision(
            EquipmentRecord {
                equipment_id: Uuid::new_v4(),
                equipment_name: name.into(),
                equipment_type: "drill".into(),
                manufacturer: String::new(),
                model: String::new(),
                production_year: 2021,
                location: String::new(),
            },
            Utc::now() - Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn load_respects_cap_and_order() {
        let store = MemoryStore::new();
        let names = ["a", "b", "c"];
        for name in names {
            store.write_equipment_and_readings(&unit(name)).await.unwrap();
        }
        let loaded = store.load_equipment(2).await.unwrap();
        let loaded_names: Vec<&str> = loaded.iter().map(|e| e.name()).collect();
        assert_eq!(loaded_names, vec!["a", "b"]);
        assert_eq!(store.load_equipment(10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn load_returns_latest_reading() {
        let store = MemoryStore::new();
        let equipment = unit("hauler");
        store.write_equipment_and_readings(&equipment).await.unwrap();

        let mut newer = equipment.readings.oil_pressure.clone();
        newer.value = 52.0;
        newer.timestamp = Utc::now();
        store
            .insert_channel_reading(ChannelKind::OilPressure, &newer, equipment.id())
            .await
            .unwrap();

        let loaded = store.load_equipment(1).await.unwrap();
        assert_eq!(loaded[0].readings.oil_pressure.value, 52.0);
        assert_eq!(loaded[0].readings.fuel_level.value, 50.0);
        assert_eq!(store.reading_count(), 5);
    }

    #[tokio::test]
    async fn duplicate_provisioning_is_rejected() {
        let store = MemoryStore::new();
        let equipment = unit("grader");
        store.write_equipment_and_readings(&equipment).await.unwrap();
        let err = store
            .write_equipment_and_readings(&equipment)
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(store.equipment_count(), 1);
        assert_eq!(store.reading_count(), 4);
    }

    #[tokio::test]
    async fn readings_for_unknown_equipment_fail() {
        let store = MemoryStore::new();
        let reading = ChannelReading::new(45.0, Utc::now());
        let err = store
            .insert_channel_reading(ChannelKind::OilPressure, &reading, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::UnknownEquipment { .. }));
    }
}
