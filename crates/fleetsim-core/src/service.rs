//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Equipment provisioning and working-set loading."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::Utc;
use fleetsim_persistence::{EquipmentStore, PersistenceError};
use fleetsim_sim::{Equipment, EquipmentRecord, WorkingSet};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Failure to provision equipment from an external record.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("equipment record is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Incoming equipment record. A missing or nil id is replaced with a fresh one.
#[derive(Debug, Deserialize)]
struct NewEquipment {
    #[serde(default)]
    equipment_id: Option<Uuid>,
    equipment_name: String,
    equipment_type: String,
    #[serde(default)]
    manufacturer: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    production_year: i32,
    #[serde(default)]
    location: String,
}

impl From<NewEquipment> for EquipmentRecord {
    fn from(value: NewEquipment) -> Self {
        let equipment_id = value
            .equipment_id
            .filter(|id| !id.is_nil())
            .unwrap_or_else(Uuid::new_v4);
        Self {
            equipment_id,
            equipment_name: value.equipment_name,
            equipment_type: value.equipment_type,
            manufacturer: value.manufacturer,
            model: value.model,
            production_year: value.production_year,
            location: value.location,
        }
    }
}

/// Store-facing operations that sit outside the tick loop.
#[derive(Clone)]
pub struct FleetService {
    store: Arc<dyn EquipmentStore>,
}

impl FleetService {
    pub fn new(store: Arc<dyn EquipmentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn EquipmentStore> {
        self.store.clone()
    }

    /// Decode a JSON equipment record and provision it with default readings.
    pub async fn add_equipment(&self, json: &str) -> Result<Equipment, IngestError> {
        let incoming: NewEquipment = serde_json::from_str(json)?;
        let equipment = Equipment::provision(incoming.into(), Utc::now());
        self.store.write_equipment_and_readings(&equipment).await?;
        Ok(equipment)
    }

    /// Load up to `cap` units for the update cycle.
    ///
    /// With `reset_on_load` every channel starts from its default. Otherwise the
    /// stored values are kept, except those the walk could never have produced.
    pub async fn load_working_set(
        &self,
        cap: usize,
        reset_on_load: bool,
    ) -> Result<WorkingSet, PersistenceError> {
        let mut loaded = self.store.load_equipment(cap).await?;
        for equipment in &mut loaded {
            if reset_on_load {
                equipment.reset_readings();
                continue;
            }
            for channel in equipment.sanitize_readings() {
                warn!(
                    equipment_id = %equipment.id(),
                    equipment_name = %equipment.name(),
                    channel = %channel,
                    "stored value out of range, reset to default"
                );
            }
        }
        info!(
            backend = self.store.backend(),
            requested = cap,
            loaded = loaded.len(),
            reset_on_load,
            "working set loaded"
        );
        Ok(WorkingSet::new(loaded))
    }

    /// Stored equipment with their latest readings, values untouched.
    pub async fn list(&self, cap: usize) -> Result<Vec<Equipment>, PersistenceError> {
        let equipment = self.store.load_equipment(cap).await?;
        debug!(count = equipment.len(), "equipment listed");
        Ok(equipment)
    }
}

impl std::fmt::Debug for FleetService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetService")
            .field("backend", &self.store.backend())
            .finish()
    }
}
