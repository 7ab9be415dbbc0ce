use std::time::Duration;

use alloy::{
    network::{EthereumWallet, ReceiptResponse, TransactionBuilder},
    primitives::Address,
    providers::{DynProvider, PendingTransactionError, Provider, ProviderBuilder},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::{http::reqwest::Url, RpcError, TransportErrorKind},
};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::{
    artifacts::Artifact,
    config::NetworkConfig,
    contracts::ContractKind,
    deployer::{DeployError, Deployer, Deployment},
    ledger::DeploymentLedger,
    migration::NetworkContext,
};

/// Deploys contracts through a JSON-RPC node.
///
/// Transactions are signed locally when a private key is given. Otherwise they are sent from
/// the first account the node manages (e.g. a local development chain).
pub struct RpcDeployer {
    runtime: Runtime,
    provider: DynProvider,
    network: String,
    from: Option<Address>,
    confirmations: u64,
    timeout: Duration,
    ledger: DeploymentLedger,
}

impl RpcDeployer {
    /// Connects to the network and discovers the accounts available for deployment.
    ///
    /// # Parameters
    /// - `network`: Name of the network, used as the ledger key.
    /// - `config`: Connection settings of the network.
    /// - `signer`: Local key to sign with. `None` uses the node's accounts.
    /// - `ledger`: Where deployed addresses are recorded.
    ///
    /// # Returns
    /// The deployer and the network context (name and accounts) the migration runs against.
    pub fn connect(
        network: &str,
        config: &NetworkConfig,
        signer: Option<PrivateKeySigner>,
        ledger: DeploymentLedger,
    ) -> Result<(Self, NetworkContext), DeployError> {
        let url: Url = config
            .rpc_url
            .parse()
            .map_err(|e| {
                DeployError::NetworkUnavailable(format!("invalid RPC URL '{}': {e}", config.rpc_url))
            })?;
        let runtime = Runtime::new().map_err(|e| {
            DeployError::NetworkUnavailable(format!("failed to start async runtime: {e}"))
        })?;

        let network_error = |e: RpcError<TransportErrorKind>| {
            DeployError::NetworkUnavailable(format!("{}: {e}", config.rpc_url))
        };

        let (provider, accounts) = match signer {
            Some(signer) => {
                let address = signer.address();
                let provider = ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect_http(url)
                    .erased();
                (provider, vec![address])
            }
            None => {
                let provider = ProviderBuilder::new()
                    .connect_http(url)
                    .erased();
                let accounts = runtime
                    .block_on(async { provider.get_accounts().await })
                    .map_err(network_error)?;
                (provider, accounts)
            }
        };

        let chain_id = runtime
            .block_on(async { provider.get_chain_id().await })
            .map_err(network_error)?;
        info!("Connected to {network} (chain id {chain_id}) at {}", config.rpc_url);

        let context = NetworkContext { name: network.to_string(), accounts: accounts.clone() };
        let deployer = Self {
            runtime,
            provider,
            network: network.to_string(),
            from: accounts.first().copied(),
            confirmations: config.confirmations,
            timeout: config.timeout(),
            ledger,
        };

        Ok((deployer, context))
    }

    pub fn ledger(&self) -> &DeploymentLedger {
        &self.ledger
    }

    /// Turns a mined receipt into a deployment and persists it to the ledger.
    ///
    /// The ledger is saved on every success, so earlier deployments stay recorded when a later
    /// one fails.
    fn record_receipt(
        &mut self,
        contract: ContractKind,
        artifact: &Artifact,
        receipt: &TransactionReceipt,
    ) -> Result<Deployment, DeployError> {
        if !receipt.status() {
            return Err(DeployError::TransactionFailed {
                contract,
                reason: format!("transaction {} reverted", receipt.transaction_hash),
            });
        }
        let address = receipt
            .contract_address
            .ok_or_else(|| DeployError::TransactionFailed {
                contract,
                reason: format!("receipt of {} has no contract address", receipt.transaction_hash),
            })?;

        let deployment = Deployment {
            contract,
            address,
            transaction_hash: Some(receipt.transaction_hash),
            block_number: receipt.block_number,
        };

        self.ledger
            .record(&self.network, &deployment, &artifact.contract_name);
        self.ledger.save()?;

        Ok(deployment)
    }
}

impl Deployer for RpcDeployer {
    fn deploy(
        &mut self,
        contract: ContractKind,
        artifact: &Artifact,
    ) -> Result<Deployment, DeployError> {
        let from = self
            .from
            .ok_or_else(|| DeployError::TransactionFailed {
                contract,
                reason: "no account available to deploy from".to_string(),
            })?;

        let tx = TransactionRequest::default()
            .with_from(from)
            .with_deploy_code(artifact.bytecode.clone());

        debug!("Sending creation transaction for {contract} from {from}");
        let receipt = self.runtime.block_on(async {
            let pending = self
                .provider
                .send_transaction(tx)
                .await
                .map_err(|e| classify_rpc_error(contract, e))?;
            info!("{contract}: transaction {} sent, waiting for receipt", pending.tx_hash());

            pending
                .with_required_confirmations(self.confirmations)
                .with_timeout(Some(self.timeout))
                .get_receipt()
                .await
                .map_err(|e| classify_pending_error(contract, e))
        })?;

        self.record_receipt(contract, artifact, &receipt)
    }
}

fn classify_rpc_error(contract: ContractKind, error: RpcError<TransportErrorKind>) -> DeployError {
    match error {
        RpcError::Transport(kind) => DeployError::NetworkUnavailable(kind.to_string()),
        other => classify_message(contract, other.to_string()),
    }
}

fn classify_pending_error(contract: ContractKind, error: PendingTransactionError) -> DeployError {
    match error {
        PendingTransactionError::TransportError(e) => classify_rpc_error(contract, e),
        other => DeployError::TransactionFailed { contract, reason: other.to_string() },
    }
}

/// Maps a node error message onto the deployment error taxonomy.
fn classify_message(contract: ContractKind, message: String) -> DeployError {
    if message
        .to_lowercase()
        .contains("insufficient funds")
    {
        DeployError::InsufficientFunds { contract, reason: message }
    } else {
        DeployError::TransactionFailed { contract, reason: message }
    }
}

#[cfg(test)]
mod tests {
    use alloy::{
        json_abi::JsonAbi,
        primitives::{Bytes, B256},
    };
    use serde_json::json;

    use super::*;

    fn ledger() -> (tempfile::TempDir, DeploymentLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = DeploymentLedger::open(dir.path().join("deployments.json")).unwrap();
        (dir, ledger)
    }

    fn network_config(rpc_url: &str) -> NetworkConfig {
        NetworkConfig { rpc_url: rpc_url.to_string(), confirmations: 1, timeout_secs: 5 }
    }

    fn offline_deployer(from: Option<Address>, ledger: DeploymentLedger) -> RpcDeployer {
        // Building an HTTP provider does not open a connection.
        let url: Url = "http://127.0.0.1:1".parse().unwrap();
        RpcDeployer {
            runtime: Runtime::new().unwrap(),
            provider: ProviderBuilder::new()
                .connect_http(url)
                .erased(),
            network: "test".to_string(),
            from,
            confirmations: 1,
            timeout: Duration::from_secs(5),
            ledger,
        }
    }

    fn artifact(name: &str) -> Artifact {
        Artifact {
            contract_name: name.to_string(),
            abi: JsonAbi::new(),
            bytecode: Bytes::from(vec![0x60, 0x80, 0x60, 0x40]),
        }
    }

    fn receipt(success: bool, tx_byte: u8, contract_address: Option<Address>) -> TransactionReceipt {
        let status = if success { "0x1" } else { "0x0" };
        let logs_bloom = format!("0x{}", "0".repeat(512));
        serde_json::from_value(json!({
            "type": "0x2",
            "status": status,
            "cumulativeGasUsed": "0x5208",
            "logs": [],
            "logsBloom": logs_bloom,
            "transactionHash": B256::repeat_byte(tx_byte),
            "transactionIndex": "0x0",
            "blockHash": B256::repeat_byte(0xbb),
            "blockNumber": "0x10",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "from": Address::repeat_byte(0xaa),
            "to": null,
            "contractAddress": contract_address,
        }))
        .expect("invalid receipt fixture")
    }

    #[test]
    fn test_deploy_without_account_fails_before_sending() {
        let (_dir, ledger) = ledger();
        let mut deployer = offline_deployer(None, ledger);

        let err = deployer
            .deploy(ContractKind::PrimaryToken, &artifact("WJ"))
            .unwrap_err();

        assert_eq!(
            err,
            DeployError::TransactionFailed {
                contract: ContractKind::PrimaryToken,
                reason: "no account available to deploy from".to_string(),
            }
        );
        assert!(deployer
            .ledger()
            .get("test", ContractKind::PrimaryToken)
            .is_none());
    }

    #[test]
    fn test_successful_receipt_is_saved_to_ledger() {
        let (dir, ledger) = ledger();
        let mut deployer = offline_deployer(Some(Address::repeat_byte(0xaa)), ledger);
        let address = Address::repeat_byte(0x01);

        let deployment = deployer
            .record_receipt(ContractKind::PrimaryToken, &artifact("WJ"), &receipt(true, 1, Some(address)))
            .unwrap();

        assert_eq!(deployment.address, address);
        assert_eq!(deployment.transaction_hash, Some(B256::repeat_byte(1)));
        assert_eq!(deployment.block_number, Some(16));

        let on_disk = DeploymentLedger::open(dir.path().join("deployments.json")).unwrap();
        let entry = on_disk
            .get("test", ContractKind::PrimaryToken)
            .unwrap();
        assert_eq!(entry.address, address);
        assert_eq!(entry.artifact, "WJ");
    }

    #[test]
    fn test_reverted_receipt_keeps_earlier_deployments() {
        let (dir, ledger) = ledger();
        let mut deployer = offline_deployer(Some(Address::repeat_byte(0xaa)), ledger);

        deployer
            .record_receipt(
                ContractKind::PrimaryToken,
                &artifact("WJ"),
                &receipt(true, 1, Some(Address::repeat_byte(0x01))),
            )
            .unwrap();
        let err = deployer
            .record_receipt(
                ContractKind::PrimaryTokenFuzzingVariant,
                &artifact("WJFuzzing"),
                &receipt(false, 2, None),
            )
            .unwrap_err();

        match err {
            DeployError::TransactionFailed { contract, reason } => {
                assert_eq!(contract, ContractKind::PrimaryTokenFuzzingVariant);
                assert!(reason.contains("reverted"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let on_disk = DeploymentLedger::open(dir.path().join("deployments.json")).unwrap();
        assert_eq!(
            on_disk
                .get("test", ContractKind::PrimaryToken)
                .unwrap()
                .address,
            Address::repeat_byte(0x01)
        );
        assert!(on_disk
            .get("test", ContractKind::PrimaryTokenFuzzingVariant)
            .is_none());
    }

    #[test]
    fn test_receipt_without_contract_address_fails() {
        let (_dir, ledger) = ledger();
        let mut deployer = offline_deployer(Some(Address::repeat_byte(0xaa)), ledger);

        let err = deployer
            .record_receipt(ContractKind::TestFlashLender, &artifact("TestFlashLender"), &receipt(true, 3, None))
            .unwrap_err();

        match err {
            DeployError::TransactionFailed { contract, reason } => {
                assert_eq!(contract, ContractKind::TestFlashLender);
                assert!(reason.contains("no contract address"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(deployer
            .ledger()
            .get("test", ContractKind::TestFlashLender)
            .is_none());
    }

    #[test]
    fn test_classify_insufficient_funds() {
        let err = classify_message(
            ContractKind::PrimaryToken,
            "Insufficient funds for gas * price + value".to_string(),
        );
        assert!(matches!(
            err,
            DeployError::InsufficientFunds { contract: ContractKind::PrimaryToken, .. }
        ));
    }

    #[test]
    fn test_classify_revert_as_transaction_failure() {
        let err = classify_rpc_error(
            ContractKind::TestFlashLender,
            RpcError::local_usage_str("execution reverted"),
        );
        match err {
            DeployError::TransactionFailed { contract, reason } => {
                assert_eq!(contract, ContractKind::TestFlashLender);
                assert!(reason.contains("execution reverted"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_classify_transport_error_as_network_unavailable() {
        let err = classify_rpc_error(
            ContractKind::TestTransferReceiver,
            RpcError::Transport(TransportErrorKind::BackendGone),
        );
        assert!(matches!(err, DeployError::NetworkUnavailable(_)));
    }

    #[test]
    fn test_connect_rejects_invalid_url() {
        let (_dir, ledger) = ledger();
        let result = RpcDeployer::connect("test", &network_config("not a url"), None, ledger);

        assert!(matches!(result, Err(DeployError::NetworkUnavailable(_))));
    }

    #[test]
    fn test_connect_reports_unreachable_node() {
        let (_dir, ledger) = ledger();
        // Port 1 is reserved and nothing listens on it.
        let result =
            RpcDeployer::connect("test", &network_config("http://127.0.0.1:1"), None, ledger);

        assert!(matches!(result, Err(DeployError::NetworkUnavailable(_))));
    }
}
