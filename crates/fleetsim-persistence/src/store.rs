//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Equipment store gateway and storage bindings."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use async_trait::async_trait;
use fleetsim_sim::{ChannelKind, ChannelReading, Equipment};
use uuid::Uuid;

use crate::Result;

/// Gateway to the durable copy of the fleet.
#[async_trait]
pub trait EquipmentStore: Send + Sync {
    /// Short backend label used in logs.
    fn backend(&self) -> &'static str;

    /// Load up to `max_count` units in insertion order, each with the latest
    /// stored reading per channel. Returns fewer when fewer exist.
    async fn load_equipment(&self, max_count: usize) -> Result<Vec<Equipment>>;

    /// Append one reading for `equipment_id`. Every call adds a new row.
    async fn insert_channel_reading(
        &self,
        kind: ChannelKind,
        reading: &ChannelReading,
        equipment_id: Uuid,
    ) -> Result<()>;

    /// Provision a unit with its initial readings. Rejects an id that already exists.
    async fn write_equipment_and_readings(&self, equipment: &Equipment) -> Result<()>;
}
