//! The deployment steps, and the runner executing them against a chain.
//!
//! Steps run in a fixed order. Each reads the deployment records written by
//! earlier steps and writes its own, so re-running a step against an
//! up-to-date chain is a no-op.

mod ownership;
mod proxy;
mod setter;

use std::collections::BTreeSet;

use alloy::{primitives::Address, sol_types::SolCall};
use tracing::info;

use crate::{
    artifacts::ArtifactStore,
    chain::Chain,
    config::NamedAddresses,
    constants::{DEFAULT_PROXY_ADMIN_KEY, PERP_BUYBACK_KEY, PERP_BUYBACK_POOL_KEY},
    deployments::DeploymentStore,
    errors::ScriptError,
    executor::{Execution, Executor},
    pending::PendingActions,
};

pub use ownership::{plan_ownership, OwnershipPlan, OwnershipStatus, Reconciliation};

/// A deployment step
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    /// Deploy the buyback pool behind a proxy
    PerpBuybackPool,
    /// Deploy the buyback controller behind a proxy
    PerpBuyback,
    /// Point the pool at the controller
    Setter,
    /// Hand the contracts to the multisig
    TransferOwners,
}

impl Step {
    /// Every step, in execution order
    pub const ALL: [Step; 4] =
        [Step::PerpBuybackPool, Step::PerpBuyback, Step::Setter, Step::TransferOwners];

    /// The step's identifier, which fixes its position in the order
    pub fn id(self) -> &'static str {
        match self {
            Step::PerpBuybackPool => "001-PerpBuybackPool",
            Step::PerpBuyback => "002-PerpBuyback",
            Step::Setter => "003-Setter",
            Step::TransferOwners => "004-transfer-owners",
        }
    }

    /// The tag selecting the step
    pub fn tag(self) -> &'static str {
        match self {
            Step::PerpBuybackPool => "PerpBuybackPool",
            Step::PerpBuyback => "PerpBuyback",
            Step::Setter => "Setter",
            Step::TransferOwners => "transfer-owners",
        }
    }

    /// The step with the given tag
    pub fn from_tag(tag: &str) -> Option<Step> {
        Step::ALL.into_iter().find(|step| step.tag() == tag)
    }

    /// The deployment records the step needs to exist
    pub fn reads(self) -> &'static [&'static str] {
        match self {
            Step::PerpBuybackPool => &[],
            Step::PerpBuyback => &[PERP_BUYBACK_POOL_KEY],
            Step::Setter => &[PERP_BUYBACK_POOL_KEY, PERP_BUYBACK_KEY],
            Step::TransferOwners => {
                &[DEFAULT_PROXY_ADMIN_KEY, PERP_BUYBACK_POOL_KEY, PERP_BUYBACK_KEY]
            }
        }
    }

    /// The deployment records the step writes
    pub fn produces(self) -> &'static [&'static str] {
        match self {
            Step::PerpBuybackPool => &[PERP_BUYBACK_POOL_KEY, DEFAULT_PROXY_ADMIN_KEY],
            Step::PerpBuyback => &[PERP_BUYBACK_KEY, DEFAULT_PROXY_ADMIN_KEY],
            Step::Setter | Step::TransferOwners => &[],
        }
    }
}

/// Select the steps to run for `tags`.
///
/// No tags selects every step. Otherwise the tagged steps run, together with
/// the producer of every record a selected step reads that is not yet stored.
pub fn plan(tags: &[String], deployments: &DeploymentStore) -> Result<Vec<Step>, ScriptError> {
    if tags.is_empty() {
        return Ok(Step::ALL.to_vec());
    }

    let mut selected = BTreeSet::new();
    for tag in tags {
        let step = Step::from_tag(tag).ok_or_else(|| {
            ScriptError::Configuration(format!(
                "unknown tag `{tag}`, expected one of {}",
                Step::ALL.map(Step::tag).join(", ")
            ))
        })?;
        selected.insert(step);
    }

    loop {
        let missing_producer = selected
            .iter()
            .flat_map(|step| step.reads())
            .filter(|key| !deployments.contains(key))
            .filter(|key| !selected.iter().any(|step| step.produces().contains(key)))
            .find_map(|key| Step::ALL.into_iter().find(|step| step.produces().contains(key)));

        match missing_producer {
            Some(step) => {
                info!("Adding {} to produce its missing records", step.id());
                selected.insert(step);
            }
            None => break,
        }
    }

    Ok(selected.into_iter().collect())
}

/// What to do when a contract lacks ownership support
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnsupportedPolicy {
    /// Stop reconciling the remaining contracts
    #[default]
    StopAll,
    /// Skip the contract and reconcile the rest
    SkipContract,
}

/// Executes deployment steps against a chain
pub struct StepRunner<C> {
    /// The chain deployed to
    chain: C,
    /// The external addresses the contracts are configured with
    addresses: NamedAddresses,
    /// The compiled contracts
    artifacts: ArtifactStore,
    /// The records of previous deployments
    deployments: DeploymentStore,
    /// Sends transactions or defers them to the multisig
    executor: Executor,
}

impl<C: Chain> StepRunner<C> {
    /// Create a runner
    pub fn new(
        chain: C,
        addresses: NamedAddresses,
        artifacts: ArtifactStore,
        deployments: DeploymentStore,
    ) -> Self {
        Self { chain, addresses, artifacts, deployments, executor: Executor::default() }
    }

    /// The chain deployed to
    pub fn chain(&self) -> &C {
        &self.chain
    }

    /// The external addresses the contracts are configured with
    pub fn addresses(&self) -> &NamedAddresses {
        &self.addresses
    }

    /// The deployment records
    pub fn deployments(&self) -> &DeploymentStore {
        &self.deployments
    }

    /// The actions deferred so far
    pub fn pending(&self) -> &PendingActions {
        self.executor.pending()
    }

    /// Run `steps` in order, stopping at the first error
    pub async fn run(
        &mut self,
        steps: &[Step],
        policy: UnsupportedPolicy,
    ) -> Result<(), ScriptError> {
        for step in steps {
            info!("Running {}", step.id());
            match step {
                Step::PerpBuybackPool => self.deploy_perp_buyback_pool().await?,
                Step::PerpBuyback => self.deploy_perp_buyback().await?,
                Step::Setter => self.set_perp_buyback().await?,
                Step::TransferOwners => {
                    self.transfer_owners(policy).await?;
                }
            }
        }

        Ok(())
    }

    /// Call a view method on a recorded contract.
    ///
    /// Fails with [ScriptError::UnsupportedCapability] if the recorded
    /// interface lacks the method.
    async fn read<T: SolCall>(&self, key: &str, call: T) -> Result<T::Return, ScriptError> {
        let to = self.supporting(key, method_name::<T>())?;
        let output = self.chain.call(to, call.abi_encode().into()).await?;
        T::abi_decode_returns(&output)
            .map_err(|e| ScriptError::ContractInteraction(format!("{key}.{}: {e}", T::SIGNATURE)))
    }

    /// Execute a method on a recorded contract as `from`, deferring it if
    /// `from` cannot be signed for
    async fn execute<T: SolCall>(
        &mut self,
        key: &str,
        from: Address,
        call: T,
    ) -> Result<Execution, ScriptError> {
        let to = self.supporting(key, method_name::<T>())?;
        self.executor.execute(&self.chain, from, to, key, call).await
    }

    /// Queue a method on a recorded contract without attempting it
    fn defer<T: SolCall>(&mut self, key: &str, from: Address, call: T) -> Result<(), ScriptError> {
        let to = self.supporting(key, method_name::<T>())?;
        self.executor.defer(from, to, key, call);
        Ok(())
    }

    /// The address of a recorded contract whose interface has `method`
    fn supporting(&self, key: &str, method: &str) -> Result<Address, ScriptError> {
        let record = self.deployments.require(key)?;
        if !record.has_method(method) {
            return Err(ScriptError::UnsupportedCapability {
                contract: key.to_string(),
                method: method.to_string(),
            });
        }
        Ok(record.address)
    }
}

/// The bare name of a Solidity function, e.g. `owner` for `owner()`
pub(crate) fn method_name<T: SolCall>() -> &'static str {
    T::SIGNATURE.split('(').next().unwrap_or(T::SIGNATURE)
}
