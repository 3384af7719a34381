//! ---
//! fleet_section: "02-simulation"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Signal generator module exports and shared types."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
//! Synthetic signal generation for fleet telemetry.
//!
//! [`PulseCurve`] decides how many units move on a tick, [`walk`] nudges a
//! single channel value, and [`WorkingSet`] applies both to the loaded
//! equipment.

pub mod channel;
pub mod curve;
pub mod equipment;
pub mod walk;
pub mod working_set;

pub use channel::{ChannelKind, ChannelProfile};
pub use curve::PulseCurve;
pub use equipment::{ChannelReading, ChannelReadings, Equipment, EquipmentRecord};
pub use walk::{step, walk, WalkBounds, WalkDraw};
pub use working_set::{TouchedEquipment, WorkingSet};
