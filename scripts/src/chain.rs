//! Access to the chain the contracts are deployed to

use std::str::FromStr;

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner},
    transports::http::reqwest::Url,
};
use tracing::debug;

use crate::{
    config::{KeySource, NetworkSettings},
    errors::ScriptError,
};

/// A transaction to submit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRequest {
    /// The sender, which must be a signer held by the chain client
    pub from: Address,
    /// The recipient, or `None` to create a contract
    pub to: Option<Address>,
    /// The calldata, or the creation code when creating a contract
    pub input: Bytes,
}

/// The result of a mined, successful transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxOutcome {
    /// The transaction hash
    pub tx_hash: B256,
    /// The created contract, for contract creations
    pub contract_address: Option<Address>,
}

/// The chain operations the deployment steps are built from.
///
/// Every method waits for the network to respond; transactions are only
/// reported once mined.
#[allow(async_fn_in_trait)]
pub trait Chain {
    /// The chain ID
    fn chain_id(&self) -> u64;

    /// The account deploying the contracts
    fn deployer(&self) -> Address;

    /// Whether transactions from `address` can be signed locally
    fn can_sign(&self, address: Address) -> bool;

    /// Execute a read-only call and return its raw output
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ScriptError>;

    /// Submit a transaction and wait for it to be mined
    async fn send(&self, tx: TxRequest) -> Result<TxOutcome, ScriptError>;

    /// The runtime code at `address`
    async fn code_at(&self, address: Address) -> Result<Bytes, ScriptError>;

    /// The value of a storage slot of `address`
    async fn storage_at(&self, address: Address, slot: U256) -> Result<B256, ScriptError>;
}

// --------------
// | RPC client |
// --------------

/// A [Chain] backed by an RPC endpoint
pub struct RpcChain {
    /// The provider, with a wallet holding every local signer
    provider: DynProvider,
    /// The chain ID reported by the endpoint
    chain_id: u64,
    /// The deployer's address
    deployer: Address,
    /// The addresses of all local signers, the deployer first
    signers: Vec<Address>,
}

/// Build a signer from a key source
pub fn signer_from_key(key: &KeySource) -> Result<PrivateKeySigner, ScriptError> {
    match key {
        KeySource::PrivateKey(key) => PrivateKeySigner::from_str(key)
            .map_err(|e| ScriptError::ClientInitialization(e.to_string())),
        KeySource::Mnemonic { phrase, index } => MnemonicBuilder::<English>::default()
            .phrase(phrase.as_str())
            .index(*index)
            .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?
            .build()
            .map_err(|e| ScriptError::ClientInitialization(e.to_string())),
    }
}

impl RpcChain {
    /// Connect to the network's RPC endpoint, checking it serves the expected chain
    pub async fn connect(settings: &NetworkSettings) -> Result<Self, ScriptError> {
        let deployer_signer = signer_from_key(&settings.deployer_key)?;
        let deployer = deployer_signer.address();
        let mut signers = vec![deployer];
        let mut wallet = EthereumWallet::new(deployer_signer);

        if let Some(owner_key) = &settings.owner_key {
            let owner_signer = signer_from_key(&KeySource::PrivateKey(owner_key.clone()))?;
            signers.push(owner_signer.address());
            wallet.register_signer(owner_signer);
        }

        let url = Url::parse(&settings.rpc_url)
            .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
        let provider = DynProvider::new(ProviderBuilder::new().wallet(wallet).connect_http(url));

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
        let expected = settings.network.chain_id();
        if chain_id != expected {
            return Err(ScriptError::Configuration(format!(
                "{} serves chain {chain_id}, expected {expected} for {}",
                settings.rpc_url, settings.network
            )));
        }

        debug!("connected to chain {chain_id} as {deployer:#x}");
        Ok(Self { provider, chain_id, deployer, signers })
    }
}

impl Chain for RpcChain {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn deployer(&self) -> Address {
        self.deployer
    }

    fn can_sign(&self, address: Address) -> bool {
        self.signers.contains(&address)
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ScriptError> {
        let tx = TransactionRequest::default().with_to(to).with_input(input);
        self.provider.call(tx).await.map_err(|e| ScriptError::ContractInteraction(e.to_string()))
    }

    async fn send(&self, tx: TxRequest) -> Result<TxOutcome, ScriptError> {
        let is_create = tx.to.is_none();
        let map_err = |e: String| {
            if is_create {
                ScriptError::ContractDeployment(e)
            } else {
                ScriptError::ContractInteraction(e)
            }
        };

        let request = TransactionRequest::default().with_from(tx.from);
        let request = match tx.to {
            Some(to) => request.with_to(to).with_input(tx.input),
            None => request.with_deploy_code(tx.input),
        };

        let receipt = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| map_err(e.to_string()))?
            .get_receipt()
            .await
            .map_err(|e| map_err(e.to_string()))?;

        if !receipt.status() {
            return Err(ScriptError::TransactionReverted(format!(
                "{:#x}",
                receipt.transaction_hash
            )));
        }

        Ok(TxOutcome {
            tx_hash: receipt.transaction_hash,
            contract_address: receipt.contract_address,
        })
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ScriptError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))
    }

    async fn storage_at(&self, address: Address, slot: U256) -> Result<B256, ScriptError> {
        let value = self
            .provider
            .get_storage_at(address, slot)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
        Ok(B256::from(value.to_be_bytes::<32>()))
    }
}
