//! ---
//! fleet_section: "02-simulation"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Bounded random walk applied to a single channel value."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use rand::Rng;

/// Range a walked value must stay in: strictly above `min`, at most `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkBounds {
    pub min: f64,
    pub max: f64,
}

/// The two random draws behind one walk step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkDraw {
    /// Step size, drawn from `[0, scale)`.
    pub step: u32,
    /// Direction selector drawn from `[0, 10)`; even moves up, odd moves down.
    pub direction: u32,
}

impl WalkDraw {
    pub fn sample<R: Rng + ?Sized>(rng: &mut R, scale: u32) -> Self {
        Self {
            step: rng.gen_range(0..scale.max(1)),
            direction: rng.gen_range(0..10),
        }
    }

    fn is_up(&self) -> bool {
        self.direction % 2 == 0
    }
}

/// Apply a pre-drawn step to `value`.
///
/// A step that would leave the bounds is dropped rather than clamped, so
/// values can linger next to a bound. With `only_down` every upward draw is
/// suppressed.
pub fn step(value: f64, bounds: WalkBounds, only_down: bool, draw: WalkDraw) -> f64 {
    let delta = f64::from(draw.step);
    if draw.is_up() {
        if only_down {
            return value;
        }
        let next = value + delta;
        if next <= bounds.max {
            next
        } else {
            value
        }
    } else {
        let next = value - delta;
        if next > bounds.min {
            next
        } else {
            value
        }
    }
}

/// Draw a step of scale `scale` from `rng` and apply it to `value`.
pub fn walk<R: Rng + ?Sized>(
    value: f64,
    bounds: WalkBounds,
    scale: u32,
    only_down: bool,
    rng: &mut R,
) -> f64 {
    step(value, bounds, only_down, WalkDraw::sample(rng, scale))
}
