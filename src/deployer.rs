use std::{error::Error as StdError, fmt, path::PathBuf};

use alloy::primitives::{Address, TxHash};
use tracing::info;

use crate::{artifacts::Artifact, contracts::ContractKind};

/// Errors raised while resolving or deploying a contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    ArtifactNotFound { contract: ContractKind, searched: Vec<PathBuf> },
    InvalidArtifact { contract: ContractKind, reason: String },
    NetworkUnavailable(String),
    TransactionFailed { contract: ContractKind, reason: String },
    InsufficientFunds { contract: ContractKind, reason: String },
    Ledger(String),
}

impl fmt::Display for DeployError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployError::ArtifactNotFound { contract, searched } => {
                let searched = searched
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "Artifact for {contract} not found (searched: {searched})")
            }
            DeployError::InvalidArtifact { contract, reason } => {
                write!(f, "Invalid artifact for {contract}: {reason}")
            }
            DeployError::NetworkUnavailable(msg) => write!(f, "Network unavailable: {msg}"),
            DeployError::TransactionFailed { contract, reason } => {
                write!(f, "Deployment of {contract} failed: {reason}")
            }
            DeployError::InsufficientFunds { contract, reason } => {
                write!(f, "Insufficient funds to deploy {contract}: {reason}")
            }
            DeployError::Ledger(msg) => write!(f, "Deployment ledger error: {msg}"),
        }
    }
}

impl StdError for DeployError {}

/// A contract instance published on a network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub contract: ContractKind,
    pub address: Address,
    pub transaction_hash: Option<TxHash>,
    pub block_number: Option<u64>,
}

/// Publishes compiled artifacts to a network.
///
/// Implementations receive their network configuration when they are built; `deploy` only gets
/// the contract to publish. A failed call must return its error without retrying.
pub trait Deployer {
    fn deploy(
        &mut self,
        contract: ContractKind,
        artifact: &Artifact,
    ) -> Result<Deployment, DeployError>;
}

/// Deployer that never touches a network. Addresses are predicted from the sender and a
/// locally tracked nonce.
pub struct DryRunDeployer {
    sender: Address,
    nonce: u64,
}

impl DryRunDeployer {
    pub fn new(sender: Address, starting_nonce: u64) -> Self {
        Self { sender, nonce: starting_nonce }
    }
}

impl Deployer for DryRunDeployer {
    fn deploy(
        &mut self,
        contract: ContractKind,
        artifact: &Artifact,
    ) -> Result<Deployment, DeployError> {
        let address = self.sender.create(self.nonce);
        info!(
            "[dry run] {contract} ({}, {} bytes, {} ABI functions) would be deployed at {address} (nonce {})",
            artifact.contract_name,
            artifact.bytecode.len(),
            artifact.abi.functions().count(),
            self.nonce
        );
        self.nonce += 1;

        Ok(Deployment { contract, address, transaction_hash: None, block_number: None })
    }
}
