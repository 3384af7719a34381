//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Metrics collection and export utilities."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{response::IntoResponse, Router};
use fleetsim_sim::ChannelKind;
use prometheus::{
    GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type used across the workspace.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Spawn an HTTP server that exposes the registry at `/metrics`.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new().route(
        "/metrics",
        get({
            let registry = registry.clone();
            move || metrics_handler(registry.clone())
        }),
    );

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {}", addr))?;
    let addr = std_listener
        .local_addr()
        .with_context(|| "failed to read metrics listener address")?;
    std_listener
        .set_nonblocking(true)
        .with_context(|| "failed to configure metrics listener as non-blocking")?;
    let listener = TcpListener::from_std(std_listener)
        .with_context(|| "failed to convert std listener into tokio listener")?;

    info!(address = %addr, "metrics exporter listening");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

async fn metrics_handler(registry: SharedRegistry) -> impl IntoResponse {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(prometheus::TEXT_FORMAT),
            )],
            body,
        ),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))],
                String::from("metrics encoding error"),
            )
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    /// Bound address; differs from the requested one when port 0 was asked for.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}

/// Metrics recorded by the daemon process itself.
#[derive(Clone)]
pub struct DaemonMetrics {
    starts_total: IntCounter,
    config_load_seconds: Histogram,
    build_info: GaugeVec,
}

impl DaemonMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let starts_total = IntCounter::with_opts(Opts::new(
            "fleetsimd_starts_total",
            "Total number of times the fleetsim daemon has initialised",
        ))?;
        registry.register(Box::new(starts_total.clone()))?;

        let buckets = prometheus::exponential_buckets(0.001, 2.0, 16)
            .context("failed to construct histogram buckets")?;
        let config_load_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "fleetsimd_config_load_seconds",
                "Time spent loading and validating configuration",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(config_load_seconds.clone()))?;

        let build_info = GaugeVec::new(
            Opts::new(
                "fleetsimd_build_info",
                "Build metadata for the running daemon binary",
            ),
            &["version", "profile"],
        )?;
        registry.register(Box::new(build_info.clone()))?;

        Ok(Self {
            starts_total,
            config_load_seconds,
            build_info,
        })
    }

    pub fn inc_start(&self) {
        self.starts_total.inc();
    }

    pub fn observe_config_load(&self, seconds: f64) {
        self.config_load_seconds.observe(seconds);
    }

    pub fn set_build_info(&self, version: &str, profile: &str) {
        self.build_info
            .with_label_values(&[version, profile])
            .set(1.0);
    }
}

/// Counters for the periodic update cycle.
#[derive(Clone, Debug)]
pub struct CycleMetrics {
    ticks_total: IntCounter,
    curve_count: IntGauge,
    working_set_size: IntGauge,
    equipment_touched: IntCounter,
    readings_written: IntCounterVec,
    reading_failures: IntCounterVec,
}

impl CycleMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let ticks_total = IntCounter::with_opts(Opts::new(
            "fleetsim_ticks_total",
            "Update cycle ticks executed",
        ))?;
        registry.register(Box::new(ticks_total.clone()))?;

        let curve_count = IntGauge::with_opts(Opts::new(
            "fleetsim_curve_count",
            "Units the curve asked for on the latest tick",
        ))?;
        registry.register(Box::new(curve_count.clone()))?;

        let working_set_size = IntGauge::with_opts(Opts::new(
            "fleetsim_working_set_size",
            "Equipment units held in the working set",
        ))?;
        registry.register(Box::new(working_set_size.clone()))?;

        let equipment_touched = IntCounter::with_opts(Opts::new(
            "fleetsim_equipment_touched_total",
            "Equipment units whose readings were advanced",
        ))?;
        registry.register(Box::new(equipment_touched.clone()))?;

        let readings_written = IntCounterVec::new(
            Opts::new(
                "fleetsim_readings_written_total",
                "Channel readings accepted by the store",
            ),
            &["channel"],
        )?;
        registry.register(Box::new(readings_written.clone()))?;

        let reading_failures = IntCounterVec::new(
            Opts::new(
                "fleetsim_reading_failures_total",
                "Channel readings the store refused",
            ),
            &["channel"],
        )?;
        registry.register(Box::new(reading_failures.clone()))?;

        Ok(Self {
            ticks_total,
            curve_count,
            working_set_size,
            equipment_touched,
            readings_written,
            reading_failures,
        })
    }

    pub fn set_working_set_size(&self, size: usize) {
        self.working_set_size.set(size as i64);
    }

    pub fn record_tick(&self, curve_count: u64, touched: usize) {
        self.ticks_total.inc();
        self.curve_count.set(i64::try_from(curve_count).unwrap_or(i64::MAX));
        self.equipment_touched.inc_by(touched as u64);
    }

    pub fn record_written(&self, channel: ChannelKind) {
        self.readings_written
            .with_label_values(&[channel.as_str()])
            .inc();
    }

    pub fn record_failure(&self, channel: ChannelKind) {
        self.reading_failures
            .with_label_values(&[channel.as_str()])
            .inc();
    }

    pub fn ticks(&self) -> u64 {
        self.ticks_total.get()
    }

    pub fn written(&self, channel: ChannelKind) -> u64 {
        self.readings_written
            .with_label_values(&[channel.as_str()])
            .get()
    }

    pub fn failures(&self, channel: ChannelKind) -> u64 {
        self.reading_failures
            .with_label_values(&[channel.as_str()])
            .get()
    }
}

pub use prometheus;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_metrics_track_channels_separately() {
        let metrics = CycleMetrics::new(new_registry()).unwrap();
        metrics.record_tick(3, 2);
        metrics.record_written(ChannelKind::FuelLevel);
        metrics.record_written(ChannelKind::FuelLevel);
        metrics.record_failure(ChannelKind::OilPressure);

        assert_eq!(metrics.ticks(), 1);
        assert_eq!(metrics.written(ChannelKind::FuelLevel), 2);
        assert_eq!(metrics.written(ChannelKind::OilPressure), 0);
        assert_eq!(metrics.failures(ChannelKind::OilPressure), 1);
    }

    #[test]
    fn registries_reject_duplicate_collectors() {
        let registry = new_registry();
        DaemonMetrics::new(registry.clone()).unwrap();
        assert!(DaemonMetrics::new(registry).is_err());
    }
}
