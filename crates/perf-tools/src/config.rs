//! Harness configuration
//!
//! Read from a YAML file and overridden by `PERF__<SECTION>__<KEY>`
//! environment variables. Scenario sections are kept raw here and decoded
//! by the scenario that owns them.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Harness configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub common: CommonConfig,

    /// Scenario name to its raw configuration table
    #[serde(default)]
    pub scenarios: HashMap<String, config::Value>,
}

/// Settings shared by all scenarios
#[derive(Debug, Clone, Deserialize)]
pub struct CommonConfig {
    /// Directory under which each run creates its output directory
    #[serde(default = "default_output_root_path")]
    pub output_root_path: PathBuf,

    /// Directory holding `<snapshot>.json` files
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// Upper bound for waiting on one snapshot
    #[serde(default = "default_max_wait_seconds")]
    pub max_wait_seconds: u64,

    /// Interval between readiness checks
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Snapshot holding the node inventory
    #[serde(default = "default_nodes_snapshot")]
    pub nodes_snapshot: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            output_root_path: default_output_root_path(),
            snapshot_dir: default_snapshot_dir(),
            max_wait_seconds: default_max_wait_seconds(),
            poll_interval_ms: default_poll_interval_ms(),
            nodes_snapshot: default_nodes_snapshot(),
        }
    }
}

impl CommonConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn default_output_root_path() -> PathBuf {
    std::env::temp_dir()
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("snapshots")
}

fn default_max_wait_seconds() -> u64 {
    600
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_nodes_snapshot() -> String {
    "nodes".to_string()
}

impl HarnessConfig {
    /// Load configuration from `path` and the process environment
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        Self::load_with_env(path, required, None)
    }

    /// Load configuration with an explicit environment instead of the process one
    pub fn load_with_env(
        path: &Path,
        required: bool,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix("PERF")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to load config {}", path.display()))?;

        config
            .try_deserialize()
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Decode the configuration section of one scenario
    pub fn scenario<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T> {
        let raw = self
            .scenarios
            .get(name)
            .with_context(|| format!("No configuration for scenario {}", name))?;
        raw.clone()
            .try_deserialize()
            .with_context(|| format!("Invalid configuration for scenario {}", name))
    }
}
