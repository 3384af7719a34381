//! ---
//! fleet_section: "02-simulation"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Owned working set of loaded equipment mutated once per tick."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::channel::ChannelKind;
use crate::equipment::{ChannelReadings, Equipment};
use crate::walk::walk;

/// Copy of a unit's readings right after a tick moved them.
#[derive(Debug, Clone, PartialEq)]
pub struct TouchedEquipment {
    pub equipment_id: Uuid,
    pub equipment_name: String,
    pub readings: ChannelReadings,
}

/// Ordered in-memory equipment set owned by the update cycle.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    entries: Vec<Equipment>,
}

impl WorkingSet {
    pub fn new(entries: Vec<Equipment>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Equipment> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Equipment> {
        self.entries.iter()
    }

    pub fn into_inner(self) -> Vec<Equipment> {
        self.entries
    }

    /// Walk every channel of the first `count` units (clamped to the set size)
    /// and stamp them with `now`. Units past the prefix are left untouched.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        count: u64,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Vec<TouchedEquipment> {
        let limit = usize::try_from(count)
            .unwrap_or(usize::MAX)
            .min(self.entries.len());
        let mut touched = Vec::with_capacity(limit);
        for equipment in self.entries.iter_mut().take(limit) {
            for kind in ChannelKind::ALL {
                let profile = kind.profile();
                let reading = equipment.readings.get_mut(kind);
                reading.value = walk(
                    reading.value,
                    profile.bounds(),
                    profile.step_scale,
                    profile.only_down,
                    rng,
                );
                reading.timestamp = now;
            }
            touched.push(TouchedEquipment {
                equipment_id: equipment.id(),
                equipment_name: equipment.name().to_owned(),
                readings: equipment.readings.clone(),
            });
        }
        touched
    }
}

impl From<Vec<Equipment>> for WorkingSet {
    fn from(entries: Vec<Equipment>) -> Self {
        Self::new(entries)
    }
}
