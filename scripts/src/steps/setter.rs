//! One-time wiring of the buyback pool to its controller

use tracing::info;

use super::StepRunner;
use crate::{
    chain::Chain,
    constants::{PERP_BUYBACK_KEY, PERP_BUYBACK_POOL_KEY},
    errors::ScriptError,
    executor::Execution,
    solidity::{IPerpBuybackPool, ISafeOwnable},
};

impl<C: Chain> StepRunner<C> {
    /// Point the pool at the controller, unless it already is.
    ///
    /// The call is made by the pool's current owner, so it is deferred once
    /// the pool belongs to the multisig.
    pub(super) async fn set_perp_buyback(&mut self) -> Result<(), ScriptError> {
        let buyback = self.deployments.require(PERP_BUYBACK_KEY)?.address;
        let current =
            self.read(PERP_BUYBACK_POOL_KEY, IPerpBuybackPool::getPerpBuybackCall {}).await?;
        if current == buyback {
            info!("PerpBuybackPool already points at {buyback:#x}");
            return Ok(());
        }

        let owner = self.read(PERP_BUYBACK_POOL_KEY, ISafeOwnable::ownerCall {}).await?;
        let call = IPerpBuybackPool::setPerpBuybackCall { perpBuyback: buyback };
        match self.execute(PERP_BUYBACK_POOL_KEY, owner, call).await? {
            Execution::Sent(_) => info!("Set PerpBuyback to {buyback:#x}"),
            Execution::Deferred => info!("Setting PerpBuyback to {buyback:#x} is pending"),
        }
        Ok(())
    }
}
