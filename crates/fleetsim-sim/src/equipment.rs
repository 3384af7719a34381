//! ---
//! fleet_section: "02-simulation"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Equipment identity and current channel readings."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channel::ChannelKind;

/// Descriptive attributes of a unit. Fixed once the unit is provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentRecord {
    pub equipment_id: Uuid,
    pub equipment_name: String,
    pub equipment_type: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub production_year: i32,
    #[serde(default)]
    pub location: String,
}

/// Latest value of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReading {
    /// Identity of the channel series; stays the same as the value moves.
    pub reading_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl ChannelReading {
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            reading_id: Uuid::new_v4(),
            timestamp,
            value,
        }
    }
}

/// One current reading per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReadings {
    pub fuel_level: ChannelReading,
    pub oil_pressure: ChannelReading,
    pub oil_engine_temperature: ChannelReading,
    pub transmission_oil_temperature: ChannelReading,
}

impl ChannelReadings {
    /// Fresh series for every channel, each at its default value.
    pub fn defaults(now: DateTime<Utc>) -> Self {
        let reading = |kind: ChannelKind| ChannelReading::new(kind.profile().default, now);
        Self {
            fuel_level: reading(ChannelKind::FuelLevel),
            oil_pressure: reading(ChannelKind::OilPressure),
            oil_engine_temperature: reading(ChannelKind::OilEngineTemperature),
            transmission_oil_temperature: reading(ChannelKind::TransmissionOilTemperature),
        }
    }

    pub fn get(&self, kind: ChannelKind) -> &ChannelReading {
        match kind {
            ChannelKind::FuelLevel => &self.fuel_level,
            ChannelKind::OilPressure => &self.oil_pressure,
            ChannelKind::OilEngineTemperature => &self.oil_engine_temperature,
            ChannelKind::TransmissionOilTemperature => &self.transmission_oil_temperature,
        }
    }

    pub fn get_mut(&mut self, kind: ChannelKind) -> &mut ChannelReading {
        match kind {
            ChannelKind::FuelLevel => &mut self.fuel_level,
            ChannelKind::OilPressure => &mut self.oil_pressure,
            ChannelKind::OilEngineTemperature => &mut self.oil_engine_temperature,
            ChannelKind::TransmissionOilTemperature => &mut self.transmission_oil_temperature,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelKind, &ChannelReading)> + '_ {
        ChannelKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

/// A unit in the fleet together with its current readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    #[serde(flatten)]
    pub record: EquipmentRecord,
    pub readings: ChannelReadings,
}

impl Equipment {
    pub fn new(record: EquipmentRecord, readings: ChannelReadings) -> Self {
        Self { record, readings }
    }

    /// A newly provisioned unit: every channel starts at its default.
    pub fn provision(record: EquipmentRecord, now: DateTime<Utc>) -> Self {
        Self::new(record, ChannelReadings::defaults(now))
    }

    pub fn id(&self) -> Uuid {
        self.record.equipment_id
    }

    pub fn name(&self) -> &str {
        &self.record.equipment_name
    }

    /// Put every channel back to its default value. Series ids and timestamps are kept.
    pub fn reset_readings(&mut self) {
        for kind in ChannelKind::ALL {
            self.readings.get_mut(kind).value = kind.profile().default;
        }
    }

    /// Reset any channel whose value the walk could not have produced and
    /// return the channels that were touched.
    pub fn sanitize_readings(&mut self) -> Vec<ChannelKind> {
        let mut reset = Vec::new();
        for kind in ChannelKind::ALL {
            let profile = kind.profile();
            let reading = self.readings.get_mut(kind);
            if !profile.admits(reading.value) {
                reading.value = profile.default;
                reset.push(kind);
            }
        }
        reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> EquipmentRecord {
        EquipmentRecord {
            equipment_id: Uuid::new_v4(),
            equipment_name: "haul-truck-07".into(),
            equipment_type: "haul truck".into(),
            manufacturer: "Komatsu".into(),
            model: "930E".into(),
            production_year: 2019,
            location: "pit-north".into(),
        }
    }

    #[test]
    fn provisioning_uses_channel_defaults() {
        let equipment = Equipment::provision(record(), Utc::now());
        let values: Vec<f64> = equipment.readings.iter().map(|(_, r)| r.value).collect();
        assert_eq!(values, vec![50.0, 45.0, 195.0, 200.0]);
    }

    #[test]
    fn reset_keeps_series_identity() {
        let mut equipment = Equipment::provision(record(), Utc::now());
        let before = equipment.readings.clone();
        equipment.readings.oil_pressure.value = 61.0;
        equipment.readings.fuel_level.value = 12.0;
        equipment.reset_readings();
        assert_eq!(equipment.readings, before);
    }

    #[test]
    fn sanitize_only_touches_out_of_range_channels() {
        let mut equipment = Equipment::provision(record(), Utc::now());
        equipment.readings.oil_engine_temperature.value = 300.0;
        equipment.readings.oil_pressure.value = 30.0;
        equipment.readings.fuel_level.value = 22.0;
        let reset = equipment.sanitize_readings();
        assert_eq!(
            reset,
            vec![ChannelKind::OilPressure, ChannelKind::OilEngineTemperature]
        );
        assert_eq!(equipment.readings.oil_engine_temperature.value, 195.0);
        assert_eq!(equipment.readings.oil_pressure.value, 45.0);
        assert_eq!(equipment.readings.fuel_level.value, 22.0);
    }

    #[test]
    fn record_accepts_minimal_json() {
        let json = r#"{
            "equipment_id": "6f1c1a0e-2d7b-4c55-9f0e-3f3a8d7b9b11",
            "equipment_name": "dozer-2",
            "equipment_type": "dozer"
        }"#;
        let record: EquipmentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.equipment_name, "dozer-2");
        assert_eq!(record.production_year, 0);
        assert!(record.location.is_empty());
    }
}
