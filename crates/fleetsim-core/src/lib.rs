//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Primary orchestration and lifecycle management."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
//! Update cycle, provisioning service, and simulator lifecycle for fleetsim.

pub mod cycle;
pub mod orchestrator;
pub mod service;

pub use cycle::{CycleSummary, TickReport, UpdateCycle};
pub use orchestrator::{Simulator, SimulatorHandle};
pub use service::{FleetService, IngestError};
