use std::fmt;

/// Contracts deployed by the initial migration.
///
/// Each kind maps to exactly one compiled artifact, so looking an artifact up never goes through
/// a free-form name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContractKind {
    PrimaryToken,
    PrimaryTokenFuzzingVariant,
    TestFlashLender,
    TestTransferReceiver,
}

impl ContractKind {
    /// Name of the compiled contract, as it appears in the build output.
    pub fn artifact_name(&self) -> &'static str {
        match self {
            ContractKind::PrimaryToken => "WJ",
            ContractKind::PrimaryTokenFuzzingVariant => "WJFuzzing",
            ContractKind::TestFlashLender => "TestFlashLender",
            ContractKind::TestTransferReceiver => "TestTransferReceiver",
        }
    }

    /// Source sub-directory the contract lives in, if any.
    pub fn source_dir(&self) -> Option<&'static str> {
        match self {
            ContractKind::PrimaryToken => None,
            ContractKind::PrimaryTokenFuzzingVariant => Some("fuzzing"),
            ContractKind::TestFlashLender | ContractKind::TestTransferReceiver => Some("tests"),
        }
    }

    /// Path of the contract relative to the sources root, e.g. `tests/TestFlashLender`.
    pub fn source_path(&self) -> String {
        match self.source_dir() {
            Some(dir) => format!("{dir}/{}", self.artifact_name()),
            None => self.artifact_name().to_string(),
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractKind::PrimaryToken => "PrimaryToken",
            ContractKind::PrimaryTokenFuzzingVariant => "PrimaryTokenFuzzingVariant",
            ContractKind::TestFlashLender => "TestFlashLender",
            ContractKind::TestTransferReceiver => "TestTransferReceiver",
        };
        f.pad(name)
    }
}
