//! Persistence of deployment records.
//!
//! Records live one per file under `<root>/<network>/<Key>.json`, next to a
//! `.chainId` file identifying the chain they were deployed to. This is the
//! layout `hardhat-deploy` uses, so external tooling can read it unchanged.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use alloy::{
    json_abi::JsonAbi,
    primitives::{keccak256, Address, Bytes, B256},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    constants::{CHAIN_ID_FILE, JSON_EXTENSION},
    errors::ScriptError,
};

/// The persisted result of a deployment step
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// The address of the contract
    pub address: Address,
    /// The interface of the contract
    pub abi: JsonAbi,
    /// The hash of the transaction that deployed the contract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    /// For proxied contracts, the implementation behind the proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<Address>,
    /// The keccak-256 hash of the creation bytecode the contract was deployed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode_hash: Option<B256>,
    /// The creation bytecode, as hardhat-deploy records it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<Bytes>,
}

impl DeploymentRecord {
    /// The hash of the creation bytecode, falling back to hashing the stored
    /// bytecode for records which only carry that
    pub fn creation_code_hash(&self) -> Option<B256> {
        self.bytecode_hash.or_else(|| self.bytecode.as_ref().map(keccak256))
    }

    /// Whether the recorded interface has a function named `method`
    pub fn has_method(&self, method: &str) -> bool {
        self.abi.function(method).is_some_and(|overloads| !overloads.is_empty())
    }
}

/// The deployment records of one network
#[derive(Debug, Default)]
pub struct DeploymentStore {
    /// The directory records are persisted to, if any
    dir: Option<PathBuf>,
    /// The chain the records belong to
    chain_id: u64,
    /// The records, keyed by deployment key
    records: BTreeMap<String, DeploymentRecord>,
}

impl DeploymentStore {
    /// An empty store which is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the records under `dir`, which need not exist yet.
    ///
    /// If the directory is tagged with a chain ID, it must equal `chain_id`.
    /// Nothing is written until a record is saved.
    pub fn load(dir: impl AsRef<Path>, chain_id: u64) -> Result<Self, ScriptError> {
        let dir = dir.as_ref().to_path_buf();
        let mut records = BTreeMap::new();

        if dir.exists() {
            let chain_id_path = dir.join(CHAIN_ID_FILE);
            if chain_id_path.exists() {
                let stored = fs::read_to_string(&chain_id_path)
                    .map_err(|e| ScriptError::ReadDeployments(e.to_string()))?;
                let stored: u64 = stored.trim().parse().map_err(|_| {
                    ScriptError::ReadDeployments(format!(
                        "invalid chain ID in {}",
                        chain_id_path.display()
                    ))
                })?;
                if stored != chain_id {
                    return Err(ScriptError::Configuration(format!(
                        "deployments in {} belong to chain {stored}, connected to chain {chain_id}",
                        dir.display()
                    )));
                }
            }

            let entries =
                fs::read_dir(&dir).map_err(|e| ScriptError::ReadDeployments(e.to_string()))?;
            for entry in entries {
                let path = entry.map_err(|e| ScriptError::ReadDeployments(e.to_string()))?.path();
                if !path.extension().is_some_and(|ext| ext == JSON_EXTENSION) {
                    continue;
                }
                let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };

                let contents = fs::read_to_string(&path)
                    .map_err(|e| ScriptError::ReadDeployments(e.to_string()))?;
                let record: DeploymentRecord = serde_json::from_str(&contents).map_err(|e| {
                    ScriptError::ReadDeployments(format!("{}: {e}", path.display()))
                })?;
                debug!("loaded deployment {key} at {:#x}", record.address);
                records.insert(key.to_string(), record);
            }
        }

        Ok(Self { dir: Some(dir), chain_id, records })
    }

    /// Look up a record, if present
    pub fn get(&self, key: &str) -> Option<&DeploymentRecord> {
        self.records.get(key)
    }

    /// Look up a record which a previous step must have written
    pub fn require(&self, key: &str) -> Result<&DeploymentRecord, ScriptError> {
        self.get(key)
            .ok_or_else(|| ScriptError::ReadDeployments(format!("no deployment found for {key}")))
    }

    /// Whether a record is present
    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Iterate over all records in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DeploymentRecord)> {
        self.records.iter()
    }

    /// Store a record, replacing any previous record under the same key
    pub fn save(&mut self, key: &str, record: DeploymentRecord) -> Result<(), ScriptError> {
        if let Some(dir) = &self.dir {
            let chain_id_path = dir.join(CHAIN_ID_FILE);
            if !chain_id_path.exists() {
                fs::create_dir_all(dir)
                    .map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
                fs::write(&chain_id_path, self.chain_id.to_string())
                    .map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
            }

            let path = dir.join(key).with_extension(JSON_EXTENSION);
            let contents = serde_json::to_string_pretty(&record)
                .map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
            fs::write(&path, contents).map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
        }

        self.records.insert(key.to_string(), record);
        Ok(())
    }
}
