//! Loading of compiled contract artifacts

use std::{collections::HashMap, fs, path::PathBuf};

use alloy::{
    json_abi::JsonAbi,
    primitives::{keccak256, Bytes, B256},
};
use serde::Deserialize;

use crate::{constants::JSON_EXTENSION, errors::ScriptError};

/// A compiled contract, in the Hardhat artifact format
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    /// The contract's interface
    pub abi: JsonAbi,
    /// The contract's creation bytecode
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// The hash identifying this version of the contract
    pub fn bytecode_hash(&self) -> B256 {
        keccak256(&self.bytecode)
    }

    /// The creation code with ABI-encoded constructor arguments appended
    pub fn deploy_code(&self, constructor_args: &[u8]) -> Bytes {
        [self.bytecode.as_ref(), constructor_args].concat().into()
    }
}

/// Artifacts addressed by fully qualified name, e.g. `src/Foo.sol:Foo`
#[derive(Debug, Default)]
pub struct ArtifactStore {
    /// The artifacts root, if artifacts are read from disk
    root: Option<PathBuf>,
    /// Artifacts read so far
    cache: HashMap<String, ContractArtifact>,
}

impl ArtifactStore {
    /// A store reading artifacts lazily from `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()), cache: HashMap::new() }
    }

    /// A store holding exactly the given artifacts
    pub fn from_artifacts(
        artifacts: impl IntoIterator<Item = (impl Into<String>, ContractArtifact)>,
    ) -> Self {
        let cache = artifacts.into_iter().map(|(name, a)| (name.into(), a)).collect();
        Self { root: None, cache }
    }

    /// Register an artifact, replacing any previously read under `name`
    pub fn insert(&mut self, name: impl Into<String>, artifact: ContractArtifact) {
        self.cache.insert(name.into(), artifact);
    }

    /// The path of the artifact for a fully qualified contract name
    pub fn artifact_path(&self, name: &str) -> Result<PathBuf, ScriptError> {
        let root = self.root.as_ref().ok_or_else(|| {
            ScriptError::ArtifactParsing(format!("no artifact registered for {name}"))
        })?;
        let (source, contract) = name.split_once(':').ok_or_else(|| {
            ScriptError::ArtifactParsing(format!("{name} is not a fully qualified contract name"))
        })?;

        Ok(root.join(source).join(contract).with_extension(JSON_EXTENSION))
    }

    /// Get an artifact, reading it from disk on first use
    pub fn get(&mut self, name: &str) -> Result<&ContractArtifact, ScriptError> {
        if !self.cache.contains_key(name) {
            let path = self.artifact_path(name)?;
            let contents = fs::read_to_string(&path).map_err(|e| {
                ScriptError::ArtifactParsing(format!("{}: {e}", path.display()))
            })?;
            let artifact: ContractArtifact = serde_json::from_str(&contents).map_err(|e| {
                ScriptError::ArtifactParsing(format!("{}: {e}", path.display()))
            })?;
            if artifact.bytecode.is_empty() {
                return Err(ScriptError::ArtifactParsing(format!(
                    "{name} has no bytecode, is it abstract?"
                )));
            }
            self.cache.insert(name.to_string(), artifact);
        }

        // Inserted above if it was missing
        self.cache
            .get(name)
            .ok_or_else(|| ScriptError::ArtifactParsing(format!("no artifact for {name}")))
    }
}
