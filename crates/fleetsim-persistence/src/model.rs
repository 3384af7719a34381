//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Stored row shapes and their mapping to the equipment model."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
//! Rows as they are written to disk. Identifiers are kept as strings so a
//! damaged log is reported on the read that hits it instead of at open.

use chrono::{DateTime, Utc};
use fleetsim_sim::{ChannelKind, ChannelReading, EquipmentRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{PersistenceError, Result};

/// One provisioned unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRow {
    /// Unit identifier, hyphenated UUID.
    pub equipment_id: String,
    /// Display name.
    pub equipment_name: String,
    /// Equipment class.
    pub equipment_type: String,
    /// Manufacturer name.
    pub manufacturer: String,
    /// Model designation.
    pub model: String,
    /// Year of manufacture.
    pub production_year: i32,
    /// Site or area.
    pub location: String,
}

impl From<&EquipmentRecord> for EquipmentRow {
    fn from(record: &EquipmentRecord) -> Self {
        Self {
            equipment_id: record.equipment_id.to_string(),
            equipment_name: record.equipment_name.clone(),
            equipment_type: record.equipment_type.clone(),
            manufacturer: record.manufacturer.clone(),
            model: record.model.clone(),
            production_year: record.production_year,
            location: record.location.clone(),
        }
    }
}

impl EquipmentRow {
    /// Map back to the domain record, validating the identifier.
    pub fn to_record(&self) -> Result<EquipmentRecord> {
        Ok(EquipmentRecord {
            equipment_id: parse_id(&self.equipment_id)?,
            equipment_name: self.equipment_name.clone(),
            equipment_type: self.equipment_type.clone(),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            production_year: self.production_year,
            location: self.location.clone(),
        })
    }
}

/// One appended channel value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRow {
    /// Owning unit.
    pub equipment_id: String,
    /// Channel the value belongs to.
    pub channel: ChannelKind,
    /// Series identifier of the channel.
    pub reading_id: String,
    /// Time the value was produced.
    pub timestamp: DateTime<Utc>,
    /// The value.
    pub value: f64,
}

impl ReadingRow {
    /// Build a row for `reading` of `kind` owned by `equipment_id`.
    pub fn new(kind: ChannelKind, reading: &ChannelReading, equipment_id: Uuid) -> Self {
        Self {
            equipment_id: equipment_id.to_string(),
            channel: kind,
            reading_id: reading.reading_id.to_string(),
            timestamp: reading.timestamp,
            value: reading.value,
        }
    }

    /// Map back to the domain reading, validating the series identifier.
    pub fn to_reading(&self) -> Result<ChannelReading> {
        Ok(ChannelReading {
            reading_id: parse_id(&self.reading_id)?,
            timestamp: self.timestamp,
            value: self.value,
        })
    }
}

/// Parse a stored identifier, surfacing failures as [`PersistenceError::Identifier`].
pub fn parse_id(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|source| PersistenceError::Identifier {
        value: value.to_owned(),
        source,
    })
}
