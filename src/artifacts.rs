use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy::{
    json_abi::JsonAbi,
    primitives::{hex, Bytes},
};
use serde::Deserialize;
use tracing::debug;

use crate::{contracts::ContractKind, deployer::DeployError};

/// A compiled contract ready to be deployed
#[derive(Debug, Clone)]
pub struct Artifact {
    pub contract_name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

/// Resolves contract kinds to their compiled artifacts.
pub trait ArtifactSource {
    fn load(&self, contract: ContractKind) -> Result<Artifact, DeployError>;
}

/// Artifact file as written by Truffle (`bytecode` is a hex string) or Foundry (`bytecode` is
/// an object holding the hex string).
#[derive(Debug, Deserialize)]
struct RawArtifact {
    #[serde(rename = "contractName")]
    contract_name: Option<String>,
    abi: JsonAbi,
    bytecode: Option<RawBytecode>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    Object { object: String },
}

impl RawBytecode {
    fn as_hex(&self) -> &str {
        match self {
            RawBytecode::Hex(hex) => hex,
            RawBytecode::Object { object } => object,
        }
    }
}

/// Reads artifacts from a build output directory.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Candidate files for a contract, in lookup order.
    ///
    /// Truffle flattens every contract into `<root>/<Name>.json`, some setups keep the source
    /// sub-directory, and Foundry writes `<root>/<Name>.sol/<Name>.json`.
    pub fn candidates(&self, contract: ContractKind) -> Vec<PathBuf> {
        let name = contract.artifact_name();
        let mut paths = vec![self.root.join(format!("{name}.json"))];
        if let Some(dir) = contract.source_dir() {
            paths.push(
                self.root
                    .join(dir)
                    .join(format!("{name}.json")),
            );
        }
        paths.push(
            self.root
                .join(format!("{name}.sol"))
                .join(format!("{name}.json")),
        );
        paths
    }

    /// Finds the artifact file of a contract.
    ///
    /// # Returns
    /// The first existing candidate path, or `ArtifactNotFound` listing every path searched.
    pub fn find_artifact(&self, contract: ContractKind) -> Result<PathBuf, DeployError> {
        let candidates = self.candidates(contract);
        match candidates
            .iter()
            .find(|path| path.is_file())
        {
            Some(path) => Ok(path.clone()),
            None => Err(DeployError::ArtifactNotFound { contract, searched: candidates }),
        }
    }
}

impl ArtifactSource for ArtifactStore {
    fn load(&self, contract: ContractKind) -> Result<Artifact, DeployError> {
        let path = self.find_artifact(contract)?;
        debug!("Loading {contract} from {}", path.display());

        let content = fs::read_to_string(&path).map_err(|e| DeployError::InvalidArtifact {
            contract,
            reason: format!("cannot read {}: {e}", path.display()),
        })?;

        parse_artifact(contract, &content, &path)
    }
}

/// Parses an artifact file, rejecting contracts that cannot be deployed as-is.
pub fn parse_artifact(
    contract: ContractKind,
    content: &str,
    path: &Path,
) -> Result<Artifact, DeployError> {
    let invalid = |reason: String| DeployError::InvalidArtifact { contract, reason };

    let raw: RawArtifact = serde_json::from_str(content)
        .map_err(|e| invalid(format!("{} is not a valid artifact: {e}", path.display())))?;

    let bytecode_hex = raw
        .bytecode
        .as_ref()
        .map(RawBytecode::as_hex)
        .unwrap_or_default()
        .trim();

    // Solidity leaves `__$<hash>$__` (or `__Name___`) placeholders for libraries that still
    // need linking.
    if bytecode_hex.contains("__") {
        return Err(invalid("bytecode contains unlinked library placeholders".to_string()));
    }

    let bytecode = hex::decode(bytecode_hex)
        .map_err(|e| invalid(format!("bytecode is not valid hex: {e}")))?;
    if bytecode.is_empty() {
        return Err(invalid(
            "bytecode is empty, the contract is abstract or an interface".to_string(),
        ));
    }

    // The migration never passes constructor arguments.
    if let Some(constructor) = raw
        .abi
        .constructor
        .as_ref()
        .filter(|c| !c.inputs.is_empty())
    {
        return Err(invalid(format!(
            "constructor expects {} argument(s), none are provided",
            constructor.inputs.len()
        )));
    }

    Ok(Artifact {
        contract_name: raw
            .contract_name
            .unwrap_or_else(|| contract.artifact_name().to_string()),
        abi: raw.abi,
        bytecode: Bytes::from(bytecode),
    })
}
