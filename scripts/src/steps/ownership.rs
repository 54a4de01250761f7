//! Handing the deployed contracts over to the multisig.
//!
//! The buyback contracts use two-phase ownership: the current owner proposes
//! a new owner, who then accepts. The proxy admin transfers in a single call.

use alloy::primitives::Address;
use tracing::info;

use super::{StepRunner, UnsupportedPolicy};
use crate::{
    chain::Chain,
    constants::{DEFAULT_PROXY_ADMIN_KEY, OWNABLE_CONTRACT_KEYS},
    errors::ScriptError,
    executor::Execution,
    solidity::{IProxyAdmin, ISafeOwnable},
};

/// The transactions needed to make the target the owner of a contract
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OwnershipPlan {
    /// The target already owns the contract
    AlreadyOwned,
    /// The target was proposed and only has to accept
    Accept,
    /// The current owner proposes the target, who then accepts
    ProposeAndAccept,
}

/// Decide how to move ownership of a two-phase ownable contract to `target`
pub fn plan_ownership(owner: Address, pending_owner: Address, target: Address) -> OwnershipPlan {
    if owner == target {
        OwnershipPlan::AlreadyOwned
    } else if pending_owner == target {
        OwnershipPlan::Accept
    } else {
        OwnershipPlan::ProposeAndAccept
    }
}

/// The outcome of reconciling one contract's owner
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// Nothing to do
    AlreadyOwned,
    /// The pending ownership was accepted
    Accepted(Execution),
    /// Ownership was proposed, then accepted
    ProposedAndAccepted {
        /// The proposal
        propose: Execution,
        /// The acceptance
        accept: Execution,
    },
    /// The contract does not expose two-phase ownership
    Unsupported,
}

/// The live ownership of a recorded contract
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnershipStatus {
    /// The deployment key
    pub key: String,
    /// The contract address
    pub address: Address,
    /// The owner, if the contract has one
    pub owner: Option<Address>,
    /// The proposed owner, if the contract uses two-phase ownership
    pub pending_owner: Option<Address>,
}

impl<C: Chain> StepRunner<C> {
    /// Make the multisig the owner of the proxy admin and every ownable contract.
    ///
    /// Returns the outcome per contract, in the order they were visited.
    pub async fn transfer_owners(
        &mut self,
        policy: UnsupportedPolicy,
    ) -> Result<Vec<(&'static str, Reconciliation)>, ScriptError> {
        let target = self.addresses.gnosis_safe;
        self.transfer_proxy_admin_owner(target).await?;

        let mut outcomes = Vec::with_capacity(OWNABLE_CONTRACT_KEYS.len());
        for key in OWNABLE_CONTRACT_KEYS {
            let outcome = self.reconcile_owner(key, target).await?;
            outcomes.push((key, outcome));

            if outcome == Reconciliation::Unsupported && policy == UnsupportedPolicy::StopAll {
                info!("Not reconciling the remaining contracts");
                break;
            }
        }

        Ok(outcomes)
    }

    /// Transfer the proxy admin to `target` in a single phase, unless it already owns it
    async fn transfer_proxy_admin_owner(
        &mut self,
        target: Address,
    ) -> Result<Option<Execution>, ScriptError> {
        let owner = self.read(DEFAULT_PROXY_ADMIN_KEY, IProxyAdmin::ownerCall {}).await?;
        if owner == target {
            info!("{DEFAULT_PROXY_ADMIN_KEY}'s owner is already {target:#x}");
            return Ok(None);
        }

        info!("Transferring {DEFAULT_PROXY_ADMIN_KEY}'s owner to {target:#x}");
        let call = IProxyAdmin::transferOwnershipCall { newOwner: target };
        let execution = self.execute(DEFAULT_PROXY_ADMIN_KEY, owner, call).await?;
        Ok(Some(execution))
    }

    /// Move ownership of the contract recorded under `key` to `target`
    async fn reconcile_owner(
        &mut self,
        key: &str,
        target: Address,
    ) -> Result<Reconciliation, ScriptError> {
        let owner = match self.read(key, ISafeOwnable::ownerCall {}).await {
            Ok(owner) => owner,
            Err(e) if e.is_unsupported("owner") => {
                info!("Skip since {key} is not SafeOwnable");
                return Ok(Reconciliation::Unsupported);
            }
            Err(e) => return Err(e),
        };
        let pending_owner = self.read(key, ISafeOwnable::pendingOwnerCall {}).await?;

        match plan_ownership(owner, pending_owner, target) {
            OwnershipPlan::AlreadyOwned => {
                info!("{key}'s owner is already transferred to {target:#x}");
                Ok(Reconciliation::AlreadyOwned)
            }
            OwnershipPlan::Accept => {
                info!("Accepting {key}'s ownership as {target:#x}");
                let accept = self.execute(key, target, ISafeOwnable::acceptOwnershipCall {}).await?;
                Ok(Reconciliation::Accepted(accept))
            }
            OwnershipPlan::ProposeAndAccept => {
                info!("Transferring {key}'s owner to {target:#x}");
                let call = ISafeOwnable::transferOwnershipCall { newOwner: target };
                let propose = self.execute(key, owner, call).await?;

                // Accepting before the proposal lands would revert
                let accept = match propose {
                    Execution::Sent(_) => {
                        self.execute(key, target, ISafeOwnable::acceptOwnershipCall {}).await?
                    }
                    Execution::Deferred => {
                        self.defer(key, target, ISafeOwnable::acceptOwnershipCall {})?;
                        Execution::Deferred
                    }
                };
                Ok(Reconciliation::ProposedAndAccepted { propose, accept })
            }
        }
    }

    /// The live ownership of the proxy admin and every ownable contract that
    /// has been deployed
    pub async fn ownership_status(&self) -> Result<Vec<OwnershipStatus>, ScriptError> {
        let mut statuses = Vec::new();
        for key in [DEFAULT_PROXY_ADMIN_KEY].into_iter().chain(OWNABLE_CONTRACT_KEYS) {
            let Some(record) = self.deployments.get(key) else {
                continue;
            };

            let owner = match self.read(key, ISafeOwnable::ownerCall {}).await {
                Ok(owner) => Some(owner),
                Err(e) if e.is_unsupported("owner") => None,
                Err(e) => return Err(e),
            };
            let pending_owner = match self.read(key, ISafeOwnable::pendingOwnerCall {}).await {
                Ok(pending) => Some(pending),
                Err(e) if e.is_unsupported("pendingOwner") => None,
                Err(e) => return Err(e),
            };

            statuses.push(OwnershipStatus {
                key: key.to_string(),
                address: record.address,
                owner,
                pending_owner,
            });
        }

        Ok(statuses)
    }
}
