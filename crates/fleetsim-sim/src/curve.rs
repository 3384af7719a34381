//! ---
//! fleet_section: "02-simulation"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Pulse curve selecting how many units move per tick."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::f64::consts::E;

/// Phase advance per tick before reduction modulo the period.
const PHASE_STRIDE: u64 = 300;

/// Single-humped pulse repeating every `freq` ticks, scaled to `max_peak`.
///
/// With `d = phase * 6 / freq` in `[0, 6)` the shape is
/// `e^(d-3) / (1 + e^(2(d-4)))^2`, which peaks near `0.883` at `d ~ 3.45`, so
/// the returned magnitude never exceeds `max_peak`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseCurve {
    freq: u64,
    max_peak: u64,
}

impl PulseCurve {
    /// Zero for either parameter is replaced by one.
    pub fn new(freq: u64, max_peak: u64) -> Self {
        Self {
            freq: freq.max(1),
            max_peak: max_peak.max(1),
        }
    }

    pub fn freq(&self) -> u64 {
        self.freq
    }

    pub fn max_peak(&self) -> u64 {
        self.max_peak
    }

    /// Magnitude for tick `t` (ticks count from 1).
    pub fn value(&self, t: u64) -> u64 {
        let ratio = shape(self.phase_fraction(t));
        (self.max_peak as f64 * ratio).ceil() as u64
    }

    /// `d` in `[0, 6)` for tick `t`.
    pub fn phase_fraction(&self, t: u64) -> f64 {
        let phase = self.phase(t);
        (phase as f64 * 6.0) / self.freq as f64
    }

    /// `(300 * t) mod freq`, reduced factor by factor so large tick counts cannot overflow.
    fn phase(&self, t: u64) -> u64 {
        let stride = PHASE_STRIDE % self.freq;
        let t = t % self.freq;
        ((u128::from(stride) * u128::from(t)) % u128::from(self.freq)) as u64
    }
}

fn shape(d: f64) -> f64 {
    E.powf(d - 3.0) / (1.0 + E.powf(2.0 * (d - 4.0))).powi(2)
}
