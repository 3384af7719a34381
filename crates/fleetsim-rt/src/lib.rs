//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Runtime helpers supporting the update cycle."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
//! Tick scheduling helpers for the fleetsim runtime.

pub mod scheduling;

pub use scheduling::RateLimiter;
