//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "binary"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Binary entrypoint for the fleetsim daemon."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use fleetsim_common::config::{AppConfig, StorageBackend};
use fleetsim_common::logging::init_tracing;
use fleetsim_core::{FleetService, Simulator};
use fleetsim_metrics::{new_registry, spawn_http_server, DaemonMetrics, SharedRegistry};
use fleetsim_persistence::{EquipmentStore, EventLogStore, MemoryStore, PersistenceMetrics};
use fleetsim_sim::{ChannelKind, Equipment};
use tokio::signal;
use tracing::{info, warn};

const PROFILE: &str = if cfg!(debug_assertions) {
    "debug"
} else {
    "release"
};

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    version = concat!("fleetsim ", env!("CARGO_PKG_VERSION")),
    about = "Synthetic fleet telemetry generator",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the telemetry generator")]
    Run,
    #[command(about = "Provision one equipment unit from a JSON record")]
    Add {
        #[arg(value_name = "JSON")]
        record: String,
    },
    #[command(about = "Print stored equipment with their latest readings")]
    List {
        #[arg(long, help = "Maximum number of units to print")]
        limit: Option<usize>,
        #[arg(long, help = "Emit JSON instead of a table")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("fleetsim {} ({})", env!("CARGO_PKG_VERSION"), PROFILE);
        return Ok(());
    }
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("config.yaml"));
    candidates.push(PathBuf::from("configs/fleetsim.toml"));

    let load_started = Instant::now();
    let loaded_config = AppConfig::load_with_source(&candidates)?;
    let config = loaded_config.config;
    let load_duration = load_started.elapsed();

    init_tracing("fleetsimd", &config.logging)?;
    info!(
        config_path = %loaded_config.source.display(),
        backend = ?config.storage.backend,
        "configuration loaded"
    );

    let metrics_registry = if config.metrics.enabled {
        let registry = new_registry();
        let daemon_metrics = DaemonMetrics::new(registry.clone())?;
        daemon_metrics.observe_config_load(load_duration.as_secs_f64());
        daemon_metrics.inc_start();
        daemon_metrics.set_build_info(env!("CARGO_PKG_VERSION"), PROFILE);
        Some(registry)
    } else {
        None
    };

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(config, metrics_registry).await?,
        Commands::Add { record } => {
            let store = open_store(&config, None)?;
            let equipment = FleetService::new(store)
                .add_equipment(&record)
                .await
                .context("failed to add equipment")?;
            println!("{}\t{}", equipment.id(), equipment.name());
        }
        Commands::List { limit, json } => {
            let store = open_store(&config, None)?;
            let cap = limit.unwrap_or(usize::MAX);
            let equipment = FleetService::new(store)
                .list(cap)
                .await
                .context("failed to list equipment")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&equipment)?);
            } else {
                render_equipment(&equipment);
            }
        }
    }

    Ok(())
}

fn open_store(
    config: &AppConfig,
    metrics: Option<Arc<PersistenceMetrics>>,
) -> Result<Arc<dyn EquipmentStore>> {
    let store: Arc<dyn EquipmentStore> = match config.storage.backend {
        StorageBackend::EventLog => Arc::new(
            EventLogStore::open(&config.storage.directory, metrics).with_context(|| {
                format!(
                    "failed to open event-log store at {}",
                    config.storage.directory.display()
                )
            })?,
        ),
        StorageBackend::Memory => {
            warn!("memory backend selected; nothing is kept after exit");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

async fn run_daemon(config: AppConfig, metrics_registry: Option<SharedRegistry>) -> Result<()> {
    let persistence_metrics = match &metrics_registry {
        Some(registry) => Some(Arc::new(PersistenceMetrics::new(registry.clone())?)),
        None => None,
    };
    let store = open_store(&config, persistence_metrics)?;

    let metrics_server = match &metrics_registry {
        Some(registry) => Some(spawn_http_server(registry.clone(), config.metrics.listen)?),
        None => {
            info!("metrics exporter disabled by configuration");
            None
        }
    };

    let mut handle = Simulator::new(config, store, metrics_registry)
        .start()
        .await?;

    info!(
        period_ms = handle.period().as_millis() as u64,
        "daemon running; waiting for termination signal"
    );
    tokio::select! {
        signal = shutdown_signal() => {
            let signal = signal?;
            info!(signal, "termination signal received; shutting down");
        }
        finished = handle.finished() => {
            finished?;
            info!("tick limit reached; shutting down");
        }
    }
    let summary = handle.shutdown().await?;
    info!(
        ticks = summary.ticks,
        touched = summary.touched,
        written = summary.written,
        failed = summary.failed,
        "generator stopped"
    );

    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }

    Ok(())
}

async fn shutdown_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                Ok("ctrl-c")
            }
            _ = terminate.recv() => Ok("sigterm"),
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        Ok("ctrl-c")
    }
}

fn render_equipment(equipment: &[Equipment]) {
    if equipment.is_empty() {
        println!("no equipment stored");
        return;
    }
    for unit in equipment {
        println!(
            "{} {} ({}, {} {} {}, {})",
            unit.id(),
            unit.name(),
            unit.record.equipment_type,
            unit.record.manufacturer,
            unit.record.model,
            unit.record.production_year,
            unit.record.location
        );
        for kind in ChannelKind::ALL {
            let reading = unit.readings.get(kind);
            println!(
                "    {:<30} {:>8.1}  {}",
                kind.as_str(),
                reading.value,
                reading.timestamp.to_rfc3339()
            );
        }
    }
}
