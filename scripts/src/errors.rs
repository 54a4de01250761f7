//! Definitions of errors that can occur during the execution of the deployment scripts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// Errors that can occur during the execution of the deployment scripts
#[derive(Debug)]
pub enum ScriptError {
    /// A required configuration value is missing or inconsistent
    Configuration(String),
    /// Error reading a deployment record
    ReadDeployments(String),
    /// Error writing a deployment record
    WriteDeployments(String),
    /// Error reading or parsing a compilation artifact
    ArtifactParsing(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// Error constructing calldata for a contract method
    CalldataConstruction(String),
    /// Error deploying a contract
    ContractDeployment(String),
    /// Error calling a contract method
    ContractInteraction(String),
    /// A transaction was mined but reverted
    TransactionReverted(String),
    /// The contract does not expose the given method
    UnsupportedCapability {
        /// The deployment key of the contract
        contract: String,
        /// The name of the missing method
        method: String,
    },
    /// Error writing the pending actions file
    WritePendingActions(String),
}

impl ScriptError {
    /// Whether this error reports that `method` is missing on a contract
    pub fn is_unsupported(&self, method: &str) -> bool {
        matches!(self, ScriptError::UnsupportedCapability { method: m, .. } if m == method)
    }
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Configuration(s) => write!(f, "configuration error: {}", s),
            ScriptError::ReadDeployments(s) => write!(f, "error reading deployments: {}", s),
            ScriptError::WriteDeployments(s) => write!(f, "error writing deployments: {}", s),
            ScriptError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            ScriptError::ContractDeployment(s) => write!(f, "error deploying contract: {}", s),
            ScriptError::ContractInteraction(s) => {
                write!(f, "error interacting with contract: {}", s)
            }
            ScriptError::TransactionReverted(s) => write!(f, "transaction reverted: {}", s),
            ScriptError::UnsupportedCapability { contract, method } => {
                write!(f, "no method named \"{}\" on contract {}", method, contract)
            }
            ScriptError::WritePendingActions(s) => {
                write!(f, "error writing pending actions: {}", s)
            }
        }
    }
}

impl Error for ScriptError {}
