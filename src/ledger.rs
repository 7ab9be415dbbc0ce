use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use alloy::primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{contracts::ContractKind, deployer::DeployError, deployer::Deployment};

/// Latest known instance of a contract on a network
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LedgerEntry {
    pub artifact: String,
    pub address: Address,
    pub transaction_hash: Option<TxHash>,
    pub block_number: Option<u64>,
}

/// Deployed addresses per network, persisted as JSON.
///
/// Entries are only ever written. A re-run deploys fresh instances and replaces the entries.
#[derive(Debug)]
pub struct DeploymentLedger {
    path: PathBuf,
    networks: BTreeMap<String, BTreeMap<String, LedgerEntry>>,
}

impl DeploymentLedger {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DeployError> {
        let path = path.into();
        let networks = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| DeployError::Ledger(format!("cannot read {}: {e}", path.display())))?;
            serde_json::from_str(&content).map_err(|e| {
                DeployError::Ledger(format!("{} is not a valid ledger: {e}", path.display()))
            })?
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, networks })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&mut self, network: &str, deployment: &Deployment, artifact: &str) {
        self.networks
            .entry(network.to_string())
            .or_default()
            .insert(
                deployment.contract.to_string(),
                LedgerEntry {
                    artifact: artifact.to_string(),
                    address: deployment.address,
                    transaction_hash: deployment.transaction_hash,
                    block_number: deployment.block_number,
                },
            );
    }

    pub fn get(&self, network: &str, contract: ContractKind) -> Option<&LedgerEntry> {
        self.networks
            .get(network)?
            .get(&contract.to_string())
    }

    pub fn save(&self) -> Result<(), DeployError> {
        if let Some(parent) = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            fs::create_dir_all(parent).map_err(|e| {
                DeployError::Ledger(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.networks)
            .map_err(|e| DeployError::Ledger(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| {
            DeployError::Ledger(format!("cannot write {}: {e}", self.path.display()))
        })?;

        debug!("Ledger saved to {}", self.path.display());
        Ok(())
    }
}
