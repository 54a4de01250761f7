//! Submission of state-changing calls, deferring those this process cannot sign

use alloy::{
    primitives::{Address, B256},
    sol_types::SolCall,
};
use tracing::info;

use crate::{
    chain::{Chain, TxRequest},
    errors::ScriptError,
    pending::{PendingAction, PendingActions},
};

/// What happened to a call handed to the [Executor]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Execution {
    /// The transaction was mined
    Sent(B256),
    /// The signer is not held locally, the call was queued
    Deferred,
}

/// Sends calls from local signers and queues the rest
#[derive(Debug, Default)]
pub struct Executor {
    /// Calls waiting for an external signature
    pending: PendingActions,
}

impl Executor {
    /// Execute `call` on `to` as `from`.
    ///
    /// `label` names the target in logs and pending actions, e.g. `PerpBuyback`.
    pub async fn execute<C: Chain, T: SolCall>(
        &mut self,
        chain: &C,
        from: Address,
        to: Address,
        label: &str,
        call: T,
    ) -> Result<Execution, ScriptError> {
        if !chain.can_sign(from) {
            info!("No signer for {from:#x}");
            self.defer(from, to, label, call);
            return Ok(Execution::Deferred);
        }

        let input = call.abi_encode().into();
        let outcome = chain.send(TxRequest { from, to: Some(to), input }).await?;
        info!("{label}.{} sent from {from:#x} (tx: {:#x})", T::SIGNATURE, outcome.tx_hash);
        Ok(Execution::Sent(outcome.tx_hash))
    }

    /// Queue `call` on `to` for `from` to execute out of band
    pub fn defer<T: SolCall>(&mut self, from: Address, to: Address, label: &str, call: T) {
        let description = format!("{label}.{}", T::SIGNATURE);
        info!("Deferring {description} to {from:#x}");
        self.pending.push(PendingAction { from, to, data: call.abi_encode().into(), description });
    }

    /// The calls deferred so far
    pub fn pending(&self) -> &PendingActions {
        &self.pending
    }
}
