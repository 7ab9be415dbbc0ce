//! The initial migration: publishes the token, its fuzzing variant and the two test helpers.

use alloy::primitives::Address;
use tracing::info;

use crate::{
    artifacts::{Artifact, ArtifactSource},
    contracts::ContractKind,
    deployer::{DeployError, Deployer},
};

/// Network a migration runs against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkContext {
    pub name: String,
    pub accounts: Vec<Address>,
}

#[derive(Debug)]
pub struct InitialMigration;

impl InitialMigration {
    /// Contracts deployed by this migration, in deployment order.
    pub const CONTRACTS: [ContractKind; 4] = [
        ContractKind::PrimaryToken,
        ContractKind::PrimaryTokenFuzzingVariant,
        ContractKind::TestFlashLender,
        ContractKind::TestTransferReceiver,
    ];

    /// Deploys every contract of the migration, stopping at the first failure.
    ///
    /// All artifacts are resolved before anything is sent, so a missing artifact leaves the
    /// network untouched. Contracts deployed before a failing one stay deployed. The network
    /// context is informational only: the deployer already knows where and as whom to deploy.
    pub fn run(
        &self,
        network: &NetworkContext,
        artifacts: &impl ArtifactSource,
        deployer: &mut impl Deployer,
    ) -> Result<(), DeployError> {
        info!(
            "Running initial migration on '{}' with {} account(s)",
            network.name,
            network.accounts.len()
        );

        let resolved = Self::CONTRACTS
            .iter()
            .map(|contract| {
                artifacts
                    .load(*contract)
                    .map(|artifact| (*contract, artifact))
            })
            .collect::<Result<Vec<(ContractKind, Artifact)>, DeployError>>()?;

        for (contract, artifact) in &resolved {
            info!("Deploying {contract} ({})...", contract.source_path());
            let deployment = deployer.deploy(*contract, artifact)?;
            match deployment.transaction_hash {
                Some(tx_hash) => info!("{contract} deployed at {} (tx {tx_hash})", deployment.address),
                None => info!("{contract} deployed at {}", deployment.address),
            }
        }

        info!("Initial migration finished: {} contracts deployed", resolved.len());
        Ok(())
    }
}
