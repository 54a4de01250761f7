//! Transactions that need a signature this process does not hold.
//!
//! These are collected during a run and written out as Safe Transaction
//! Builder batches, one per signing address, for execution out of band.

use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use alloy::primitives::{Address, Bytes};
use itertools::Itertools;
use serde::Serialize;
use tracing::info;

use crate::{
    constants::{SAFE_BATCH_NAME, SAFE_BATCH_VERSION},
    errors::ScriptError,
};

/// A transaction deferred for out-of-band execution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingAction {
    /// The account that must sign the transaction
    pub from: Address,
    /// The contract being called
    pub to: Address,
    /// The calldata
    pub data: Bytes,
    /// A human-readable summary, e.g. `PerpBuyback.acceptOwnership()`
    pub description: String,
}

/// The pending actions of a run, in the order they were deferred
#[derive(Debug, Default)]
pub struct PendingActions {
    /// The deferred actions
    actions: Vec<PendingAction>,
}

impl PendingActions {
    /// Queue an action, ignoring exact duplicates
    pub fn push(&mut self, action: PendingAction) {
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
    }

    /// The queued actions
    pub fn actions(&self) -> &[PendingAction] {
        &self.actions
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Group the actions into one batch per signing address, keeping their order
    pub fn to_safe_batches(&self, chain_id: u64, created_at: u64) -> Vec<SafeBatch> {
        let mut by_signer: BTreeMap<Address, Vec<&PendingAction>> = BTreeMap::new();
        for action in &self.actions {
            by_signer.entry(action.from).or_default().push(action);
        }

        by_signer
            .into_iter()
            .map(|(signer, actions)| SafeBatch {
                version: SAFE_BATCH_VERSION.to_string(),
                chain_id: chain_id.to_string(),
                created_at,
                meta: SafeBatchMeta {
                    name: SAFE_BATCH_NAME.to_string(),
                    description: actions.iter().map(|a| a.description.as_str()).join("; "),
                    created_from_safe_address: signer,
                },
                transactions: actions
                    .into_iter()
                    .map(|a| SafeTransaction {
                        to: a.to,
                        value: "0".to_string(),
                        data: a.data.clone(),
                    })
                    .collect(),
            })
            .collect()
    }

    /// Write the batches to `path`, or remove a stale file if nothing is pending
    pub fn write(&self, path: &Path, chain_id: u64) -> Result<(), ScriptError> {
        if self.is_empty() {
            if path.exists() {
                fs::remove_file(path)
                    .map_err(|e| ScriptError::WritePendingActions(e.to_string()))?;
            }
            info!("No pending actions");
            return Ok(());
        }

        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let batches = self.to_safe_batches(chain_id, created_at);
        let contents = serde_json::to_string_pretty(&batches)
            .map_err(|e| ScriptError::WritePendingActions(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ScriptError::WritePendingActions(e.to_string()))?;
        }
        fs::write(path, contents).map_err(|e| ScriptError::WritePendingActions(e.to_string()))?;

        for action in &self.actions {
            info!("Pending for {:#x}: {}", action.from, action.description);
        }
        info!("Wrote {} pending action(s) to {}", self.actions.len(), path.display());
        Ok(())
    }
}

/// A Safe Transaction Builder batch
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeBatch {
    /// The batch format version
    pub version: String,
    /// The chain ID, as a decimal string
    pub chain_id: String,
    /// Creation time in milliseconds since the epoch
    pub created_at: u64,
    /// Batch metadata
    pub meta: SafeBatchMeta,
    /// The transactions, in execution order
    pub transactions: Vec<SafeTransaction>,
}

/// Metadata of a [SafeBatch]
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeBatchMeta {
    /// The batch name
    pub name: String,
    /// What the batch does
    pub description: String,
    /// The account expected to execute the batch
    pub created_from_safe_address: Address,
}

/// A transaction in a [SafeBatch]
#[derive(Clone, Debug, Serialize)]
pub struct SafeTransaction {
    /// The contract being called
    pub to: Address,
    /// The value sent, in wei
    pub value: String,
    /// The calldata
    pub data: Bytes,
}
