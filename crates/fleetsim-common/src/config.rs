//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Shared primitives and utilities for the generator runtime."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::{debug, warn};

use crate::logging::LogFormat;

fn default_frequency() -> u64 {
    1
}

fn default_max_peak() -> u64 {
    1
}

fn default_reset_on_load() -> bool {
    true
}

fn default_storage_directory() -> PathBuf {
    PathBuf::from("target/fleetsim/store")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/fleetsim/logs")
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9899))
}

/// Top-level configuration for the generator daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub frequency: FrequencyConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "FLEETSIM_CONFIG";

    /// Load configuration from the first existing candidate, honouring `FLEETSIM_CONFIG`.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path.to_path_buf(),
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Parse a single file. `.yaml`/`.yml` files are read as YAML, anything else as TOML.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            _ => Self::from_toml_str(&contents),
        }
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that cannot be recovered by defaulting.
    pub fn validate(&self) -> Result<()> {
        if self.simulation.max_equipment == Some(0) {
            return Err(anyhow!("simulation.max_equipment must be greater than zero"));
        }
        if self.simulation.max_ticks == Some(0) {
            return Err(anyhow!("simulation.max_ticks must be greater than zero"));
        }
        if let Some(interval) = self.simulation.tick_interval {
            if interval.is_zero() {
                return Err(anyhow!("simulation.tick_interval_ms must be greater than zero"));
            }
        }
        if matches!(self.storage.backend, StorageBackend::EventLog)
            && self.storage.directory.as_os_str().is_empty()
        {
            return Err(anyhow!("storage.directory is required for the event-log backend"));
        }
        if self.frequency.frequency == 0 {
            warn!("frequency configured as 0; using 1");
        }
        if self.frequency.max_peak == 0 {
            warn!("max_peak configured as 0; using 1");
        }
        Ok(())
    }

    /// Number of equipment units to load at startup. Defaults to the peak magnitude,
    /// the most the curve can ever ask for in a single tick.
    pub fn equipment_cap(&self) -> usize {
        self.simulation
            .max_equipment
            .unwrap_or_else(|| self.frequency.effective_max_peak() as usize)
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(content).context("failed to parse configuration")
    }
}

/// Tick period and pulse magnitude.
///
/// Both values treat zero as one so a blank section still yields a running generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyConfig {
    /// Tick period in seconds. Also the period of the pulse curve, in ticks.
    #[serde(default = "default_frequency")]
    pub frequency: u64,
    /// Upper bound of the number of equipment units touched per tick.
    #[serde(default = "default_max_peak")]
    pub max_peak: u64,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            frequency: default_frequency(),
            max_peak: default_max_peak(),
        }
    }
}

impl FrequencyConfig {
    pub fn effective_frequency(&self) -> u64 {
        self.frequency.max(1)
    }

    pub fn effective_max_peak(&self) -> u64 {
        self.max_peak.max(1)
    }
}

/// Generator behaviour beyond the pulse parameters.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Cap on equipment loaded into the working set. Defaults to `max_peak`.
    #[serde(default)]
    pub max_equipment: Option<usize>,
    /// Seed for the random walk; entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Reset loaded readings to channel defaults instead of resuming stored values.
    #[serde(default = "default_reset_on_load")]
    pub reset_on_load: bool,
    /// Stop after this many ticks.
    #[serde(default)]
    pub max_ticks: Option<u64>,
    /// Overrides the wall-clock tick period without changing the curve period.
    #[serde(default, rename = "tick_interval_ms")]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub tick_interval: Option<Duration>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_equipment: None,
            seed: None,
            reset_on_load: default_reset_on_load(),
            max_ticks: None,
            tick_interval: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    #[default]
    EventLog,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_storage_directory")]
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            directory: default_storage_directory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub file: bool,
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            file: false,
            directory: default_logging_directory(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}
