//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Equipment store gateway and storage bindings."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{self, CounterVec, Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

use crate::Result;

/// Metrics published by the event-log store.
#[derive(Clone)]
pub struct PersistenceMetrics {
    records_appended: IntCounterVec,
    bytes_appended: CounterVec,
    load_duration: Histogram,
}

impl PersistenceMetrics {
    /// Register all persistence metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        let records_appended = IntCounterVec::new(
            Opts::new(
                "fleetsim_store_records_appended_total",
                "Records appended to the store, by log",
            ),
            &["log"],
        )?;
        registry.register(Box::new(records_appended.clone()))?;

        let bytes_appended = CounterVec::new(
            Opts::new(
                "fleetsim_store_bytes_appended_total",
                "Bytes appended to the store, by log",
            ),
            &["log"],
        )?;
        registry.register(Box::new(bytes_appended.clone()))?;

        let load_duration = Histogram::with_opts(
            HistogramOpts::new(
                "fleetsim_store_load_duration_seconds",
                "Time spent loading the equipment working set from the store",
            )
            .buckets(prometheus::exponential_buckets(0.001, 2.0, 12)?),
        )?;
        registry.register(Box::new(load_duration.clone()))?;

        Ok(Self {
            records_appended,
            bytes_appended,
            load_duration,
        })
    }

    /// Count one appended record of `bytes` length on `log`.
    pub fn record_append(&self, log: &str, bytes: usize) {
        self.records_appended.with_label_values(&[log]).inc();
        self.bytes_appended
            .with_label_values(&[log])
            .inc_by(bytes as f64);
    }

    /// Observe the duration of a working-set load.
    pub fn observe_load(&self, seconds: f64) {
        self.load_duration.observe(seconds);
    }
}

impl std::fmt::Debug for PersistenceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceMetrics").finish_non_exhaustive()
    }
}
