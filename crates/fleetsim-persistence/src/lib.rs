//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Equipment store gateway and storage bindings."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Durable side of the generator: the [`EquipmentStore`] seam plus the
//! in-memory and event-log adapters behind it.

use uuid::Uuid;

/// Result alias used throughout the persistence crate.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Error type for the persistence subsystem.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Wrapper for IO errors raised while reading or appending log files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// The backing store rejected or could not serve a request.
    #[error("storage error: {0}")]
    Storage(String),
    /// Provisioning hit an identifier that is already stored.
    #[error("equipment {equipment_name} ({equipment_id}) already exists")]
    Duplicate {
        /// Identifier that collided.
        equipment_id: Uuid,
        /// Name supplied with the rejected record.
        equipment_name: String,
    },
    /// A reading referenced equipment the store has never seen.
    #[error("equipment {equipment_id} is not known to the store")]
    UnknownEquipment {
        /// Identifier the reading was tagged with.
        equipment_id: Uuid,
    },
    /// A stored identifier could not be parsed back into a UUID.
    #[error("malformed identifier {value:?} in store: {source}")]
    Identifier {
        /// The raw value as stored.
        value: String,
        /// Parser failure.
        #[source]
        source: uuid::Error,
    },
    /// Wrapper for Prometheus metrics registration failures.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl PersistenceError {
    /// Whether the error is a provisioning collision rather than a store failure.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, PersistenceError::Duplicate { .. })
    }
}

pub mod event_log;
pub mod file_store;
pub mod memory;
pub mod metrics;
pub mod model;
pub mod store;

pub use event_log::{EventLogWriter, LogEntry};
pub use file_store::EventLogStore;
pub use memory::{MemoryStore, StoredReading};
pub use metrics::PersistenceMetrics;
pub use store::EquipmentStore;
