use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use miette::{miette, IntoDiagnostic, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Prefix of environment variables overriding the YAML file. Nested keys are separated by
/// `__`, e.g. `MIGRATE_NETWORKS__DEVELOPMENT__RPC_URL`.
pub const ENV_PREFIX: &str = "MIGRATE_";

/// Connection settings for a single network
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    /// Blocks to wait for after the deployment transaction is mined
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_confirmations() -> u64 {
    1
}

fn default_timeout_secs() -> u64 {
    120
}

/// Main migration configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MigrationConfig {
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    #[serde(default = "default_networks")]
    pub networks: BTreeMap<String, NetworkConfig>,
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("build/contracts")
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("deployments.json")
}

fn default_networks() -> BTreeMap<String, NetworkConfig> {
    BTreeMap::from([(
        "development".to_string(),
        NetworkConfig {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            confirmations: default_confirmations(),
            timeout_secs: default_timeout_secs(),
        },
    )])
}

impl MigrationConfig {
    /// Loads the configuration from a YAML file merged with `MIGRATE_` environment variables.
    /// A missing file is not an error, every field has a default.
    pub fn load(config_yaml_path: &Path) -> miette::Result<Self> {
        info!("Config YAML: {}", config_yaml_path.display());
        let figment = Figment::new()
            .merge(Yaml::file(config_yaml_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        figment
            .extract::<MigrationConfig>()
            .into_diagnostic()
            .wrap_err("Failed to load migration configuration:")
    }

    pub fn network(&self, name: &str) -> miette::Result<&NetworkConfig> {
        self.networks.get(name).ok_or_else(|| {
            let known = self
                .networks
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            miette!("Network '{name}' is not configured (known networks: {known})")
        })
    }
}
