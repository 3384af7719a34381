//! ---
//! fleet_section: "02-simulation"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Sensor channel catalogue and per-channel walk parameters."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::walk::WalkBounds;

/// A monitored sensor quantity carried by every equipment unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    FuelLevel,
    OilPressure,
    OilEngineTemperature,
    TransmissionOilTemperature,
}

/// Bounds, reset value, and step scale of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelProfile {
    /// Walks never step to or below this value.
    pub min: f64,
    /// Walks never step above this value.
    pub max: f64,
    /// Value used at provisioning and when a loaded reading is reset.
    pub default: f64,
    /// Exclusive upper bound of the integer step drawn per walk.
    pub step_scale: u32,
    /// Suppress upward moves so the value drains over time.
    pub only_down: bool,
}

impl ChannelProfile {
    pub fn bounds(&self) -> WalkBounds {
        WalkBounds {
            min: self.min,
            max: self.max,
        }
    }

    /// Whether `value` is a state the walk could have produced.
    pub fn admits(&self, value: f64) -> bool {
        value.is_finite() && value > self.min && value <= self.max
    }
}

impl ChannelKind {
    /// Every channel, in dispatch order.
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::FuelLevel,
        ChannelKind::OilPressure,
        ChannelKind::OilEngineTemperature,
        ChannelKind::TransmissionOilTemperature,
    ];

    pub const fn profile(self) -> ChannelProfile {
        match self {
            ChannelKind::FuelLevel => ChannelProfile {
                min: 10.0,
                max: 100.0,
                default: 50.0,
                step_scale: 2,
                only_down: true,
            },
            ChannelKind::OilPressure => ChannelProfile {
                min: 30.0,
                max: 70.0,
                default: 45.0,
                step_scale: 2,
                only_down: false,
            },
            ChannelKind::OilEngineTemperature => ChannelProfile {
                min: 120.0,
                max: 250.0,
                default: 195.0,
                step_scale: 3,
                only_down: false,
            },
            ChannelKind::TransmissionOilTemperature => ChannelProfile {
                min: 100.0,
                max: 220.0,
                default: 200.0,
                step_scale: 3,
                only_down: false,
            },
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ChannelKind::FuelLevel => "fuel_level",
            ChannelKind::OilPressure => "oil_pressure",
            ChannelKind::OilEngineTemperature => "oil_engine_temperature",
            ChannelKind::TransmissionOilTemperature => "transmission_oil_temperature",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_sit_inside_bounds() {
        for kind in ChannelKind::ALL {
            let profile = kind.profile();
            assert!(profile.admits(profile.default), "{kind} default out of range");
            assert!(profile.step_scale >= 1);
        }
    }

    #[test]
    fn only_fuel_drains() {
        let draining: Vec<_> = ChannelKind::ALL
            .into_iter()
            .filter(|kind| kind.profile().only_down)
            .collect();
        assert_eq!(draining, vec![ChannelKind::FuelLevel]);
    }

    #[test]
    fn serde_names_match_display() {
        for kind in ChannelKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }
}
