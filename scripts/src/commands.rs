//! Implementations of the various deploy scripts

use alloy::primitives::Address;
use itertools::Itertools;
use tracing::info;

use crate::{
    chain::Chain,
    cli::{DeployArgs, ReconcileArgs},
    errors::ScriptError,
    steps::{plan, Step, StepRunner},
};

/// Run the steps selected by the tags, in order
pub async fn deploy(
    args: DeployArgs,
    runner: &mut StepRunner<impl Chain>,
) -> Result<(), ScriptError> {
    let steps = plan(&args.tags, runner.deployments())?;
    info!("Running steps: {}", steps.iter().map(|step| step.id()).join(", "));

    runner.run(&steps, args.reconcile.policy()).await
}

/// Reconcile the owners of the deployed contracts
pub async fn transfer_owners(
    args: ReconcileArgs,
    runner: &mut StepRunner<impl Chain>,
) -> Result<(), ScriptError> {
    runner.run(&[Step::TransferOwners], args.policy()).await
}

/// Print every deployment record and the live ownership of the ownable contracts
pub async fn status(runner: &mut StepRunner<impl Chain>) -> Result<(), ScriptError> {
    let target = runner.addresses().gnosis_safe;
    info!("Chain {}, multisig {target:#x}", runner.chain().chain_id());

    for (key, record) in runner.deployments().iter() {
        match record.implementation {
            Some(implementation) => {
                info!("{key}: {:#x} (implementation {implementation:#x})", record.address)
            }
            None => info!("{key}: {:#x}", record.address),
        }
    }

    for status in runner.ownership_status().await? {
        let show = |address: Option<Address>| match address {
            Some(address) => format!("{address:#x}"),
            None => "-".to_string(),
        };
        let owned = if status.owner == Some(target) { " (multisig)" } else { "" };
        info!(
            "{} owner: {}{owned}, pending owner: {}",
            status.key,
            show(status.owner),
            show(status.pending_owner)
        );
    }

    Ok(())
}
