mod artifacts;
mod config;
mod contracts;
mod deployer;
mod ledger;
mod migration;
mod rpc;

use std::path::PathBuf;

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use clap::Parser;
use miette::{IntoDiagnostic, WrapErr};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    artifacts::ArtifactStore,
    config::MigrationConfig,
    deployer::DryRunDeployer,
    ledger::DeploymentLedger,
    migration::{InitialMigration, NetworkContext},
    rpc::RpcDeployer,
};

#[derive(Parser, Debug)]
#[command(version, about = "Deploy the initial contract migration to a network")]
struct Args {
    /// Path to the migration configuration file
    #[arg(long, default_value = "migrations.yaml")]
    config: PathBuf,

    /// Name of the network to deploy to, as configured in the configuration file
    #[arg(long, default_value = "development")]
    network: String,

    /// Directory holding the compiled contract artifacts (overrides the configuration)
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// File recording deployed addresses (overrides the configuration)
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Hex-encoded private key to sign with. Without it the node's own accounts are used
    #[arg(long, env = "DEPLOYER_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Resolve artifacts and predict addresses without sending any transaction
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Dry run only: account the predicted addresses are derived from. Defaults to the signer
    #[arg(long)]
    sender: Option<Address>,

    /// Dry run only: current nonce of the sender
    #[arg(long, default_value_t = 0)]
    starting_nonce: u64,
}

impl Args {
    /// Sender used to predict dry-run addresses: `--sender`, then the signer, then the zero
    /// address.
    fn dry_run_sender(&self, signer: Option<&PrivateKeySigner>) -> Address {
        match (self.sender, signer) {
            (Some(sender), _) => sender,
            (None, Some(signer)) => signer.address(),
            (None, None) => {
                warn!(
                    "No --sender or private key given, predicted addresses assume the zero \
                     address as sender"
                );
                Address::ZERO
            }
        }
    }
}

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();

    let config = MigrationConfig::load(&args.config)?;
    let network_config = config.network(&args.network)?;
    let artifacts_dir = args
        .artifacts_dir
        .clone()
        .unwrap_or_else(|| config.artifacts_dir.clone());
    let ledger_path = args
        .ledger
        .clone()
        .unwrap_or_else(|| config.ledger_path.clone());

    let signer = args
        .private_key
        .as_deref()
        .map(|key| key.parse::<PrivateKeySigner>())
        .transpose()
        .into_diagnostic()
        .wrap_err("Invalid private key")?;

    let artifacts = ArtifactStore::new(&artifacts_dir);
    info!("Artifacts: {}", artifacts_dir.display());

    if args.dry_run {
        let sender = args.dry_run_sender(signer.as_ref());
        info!("Dry run from {sender} starting at nonce {}", args.starting_nonce);
        let network = NetworkContext { name: args.network.clone(), accounts: vec![sender] };
        let mut deployer = DryRunDeployer::new(sender, args.starting_nonce);

        return InitialMigration
            .run(&network, &artifacts, &mut deployer)
            .into_diagnostic()
            .wrap_err("Dry run failed");
    }

    let ledger = DeploymentLedger::open(&ledger_path)
        .into_diagnostic()
        .wrap_err("Failed to open deployment ledger")?;

    let (mut deployer, network) =
        RpcDeployer::connect(&args.network, network_config, signer, ledger)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to connect to network '{}'", args.network))?;

    InitialMigration
        .run(&network, &artifacts, &mut deployer)
        .into_diagnostic()
        .wrap_err("Migration failed")?;

    let ledger = deployer.ledger();
    for contract in InitialMigration::CONTRACTS {
        if let Some(entry) = ledger.get(&network.name, contract) {
            info!("{contract:<28} {} ({})", entry.address, entry.artifact);
        }
    }
    info!("Deployed addresses recorded in {}", ledger.path().display());
    Ok(())
}
