//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Shared primitives and utilities for the generator runtime."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
//! Shared primitives for the fleetsim workspace.
//! This crate exposes configuration loading, logging, and loop timing
//! utilities consumed by the generator and the daemon.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod time;

pub use config::{
    AppConfig, FrequencyConfig, LoadedAppConfig, LoggingConfig, MetricsConfig, SimulationConfig,
    StorageBackend, StorageConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use metrics::{JitterHistogram, JitterSummary, LoopTimingReporter};
