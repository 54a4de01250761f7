//! An in-memory chain for exercising the deployment steps in tests

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
};

use alloy::{
    json_abi::JsonAbi,
    primitives::{Address, Bytes, B256, U256},
    sol_types::{SolCall, SolValue},
};

use crate::{
    artifacts::{ArtifactStore, ContractArtifact},
    chain::{Chain, TxOutcome, TxRequest},
    config::NamedAddresses,
    constants::{
        PERP_BUYBACK_CONTRACT, PERP_BUYBACK_POOL_CONTRACT, PROXY_ADMIN_CONTRACT,
        PROXY_IMPLEMENTATION_STORAGE_SLOT, TRANSPARENT_PROXY_CONTRACT,
    },
    deployments::DeploymentStore,
    errors::ScriptError,
    solidity::{IPerpBuybackPool, IProxyAdmin, ISafeOwnable},
    steps::StepRunner,
};

/// The account deploying the contracts
pub const DEPLOYER: Address = Address::repeat_byte(0xd0);
/// The multisig the contracts are handed to
pub const SAFE: Address = Address::repeat_byte(0x5a);

/// Creation code of the mock proxy admin
pub const ADMIN_BYTECODE: &[u8] = b"ProxyAdmin";
/// Creation code of the mock transparent proxy
pub const PROXY_BYTECODE: &[u8] = b"TransparentUpgradeableProxy";
/// Creation code of the first version of the buyback pool
pub const POOL_BYTECODE: &[u8] = b"PerpBuybackPool v1";
/// Creation code of the first version of the buyback controller
pub const BUYBACK_BYTECODE: &[u8] = b"PerpBuyback v1";

/// The flavour of a mock contract
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockKind {
    /// A proxy admin with single-phase ownership
    ProxyAdmin,
    /// A transparent proxy whose implementation is two-phase ownable
    Proxy,
    /// A bare implementation contract
    Implementation,
}

/// State of a contract on the mock chain
#[derive(Clone, Debug)]
pub struct MockContract {
    /// The flavour of the contract
    pub kind: MockKind,
    /// The creation code it was deployed from
    pub code: Bytes,
    /// The owner, for admins and proxies
    pub owner: Address,
    /// The proposed owner, for proxies
    pub pending_owner: Address,
    /// The admin of a proxy
    pub admin: Address,
    /// The implementation of a proxy
    pub implementation: Address,
    /// The initializer calldata a proxy was deployed with
    pub init_data: Bytes,
    /// The buyback address stored by the pool
    pub perp_buyback: Address,
}

/// A transaction the mock chain executed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentTx {
    /// The sender
    pub from: Address,
    /// The recipient, `None` for contract creations
    pub to: Option<Address>,
    /// The called method, or `deploy`
    pub method: &'static str,
}

/// Mutable state of the [MockChain]
#[derive(Debug, Default)]
struct MockState {
    /// Contracts by address
    contracts: HashMap<Address, MockContract>,
    /// Every executed transaction, in order
    sent: Vec<SentTx>,
    /// Addresses whose calls and transactions fail at the transport level
    failing: HashSet<Address>,
    /// Counter used to derive contract addresses and transaction hashes
    nonce: u64,
}

/// A [Chain] living entirely in memory
#[derive(Debug)]
pub struct MockChain {
    /// Accounts this chain signs for
    signers: Vec<Address>,
    /// The chain state
    state: RefCell<MockState>,
}

impl MockChain {
    /// A chain signing only for [DEPLOYER]
    pub fn new() -> Self {
        Self { signers: vec![DEPLOYER], state: RefCell::default() }
    }

    /// Also sign for `signer`
    pub fn with_signer(mut self, signer: Address) -> Self {
        self.signers.push(signer);
        self
    }

    /// The state of the contract at `address`
    pub fn contract(&self, address: Address) -> MockContract {
        self.state.borrow().contracts[&address].clone()
    }

    /// Modify the contract at `address`
    pub fn update(&self, address: Address, f: impl FnOnce(&mut MockContract)) {
        let mut state = self.state.borrow_mut();
        f(state.contracts.get_mut(&address).expect("no contract at address"));
    }

    /// Forget the contract at `address`, as after a devnet restart
    pub fn wipe(&self, address: Address) {
        self.state.borrow_mut().contracts.remove(&address);
    }

    /// Make every request touching `address` fail
    pub fn fail_requests_to(&self, address: Address) {
        self.state.borrow_mut().failing.insert(address);
    }

    /// The transactions executed so far
    pub fn sent(&self) -> Vec<SentTx> {
        self.state.borrow().sent.clone()
    }

    /// The methods called so far, excluding deployments
    pub fn sent_methods(&self) -> Vec<(Address, &'static str)> {
        self.sent().into_iter().filter_map(|tx| tx.to.map(|to| (to, tx.method))).collect()
    }

    /// Forget the executed transactions
    pub fn clear_sent(&self) {
        self.state.borrow_mut().sent.clear();
    }

    /// Check the transport has not been told to fail for `address`
    fn check_transport(&self, address: Address) -> Result<(), ScriptError> {
        if self.state.borrow().failing.contains(&address) {
            return Err(ScriptError::ContractInteraction("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

/// A revert with the given reason
fn revert(reason: &str) -> ScriptError {
    ScriptError::TransactionReverted(reason.to_string())
}

/// The function selector of calldata
fn selector(input: &[u8]) -> Result<[u8; 4], ScriptError> {
    input.get(..4).and_then(|s| s.try_into().ok()).ok_or_else(|| revert("no selector"))
}

/// Decode the arguments of `T` from calldata
fn decode<T: SolCall>(input: &[u8]) -> Result<T, ScriptError> {
    T::abi_decode(input).map_err(|e| ScriptError::CalldataConstruction(e.to_string()))
}

impl MockState {
    /// Create a contract from creation code
    fn create(&mut self, from: Address, input: &[u8]) -> Result<Address, ScriptError> {
        self.nonce += 1;
        let address = Address::left_padding_from(&(0x1000 + self.nonce).to_be_bytes());
        let mut contract = MockContract {
            kind: MockKind::Implementation,
            code: Bytes::copy_from_slice(input),
            owner: Address::ZERO,
            pending_owner: Address::ZERO,
            admin: Address::ZERO,
            implementation: Address::ZERO,
            init_data: Bytes::new(),
            perp_buyback: Address::ZERO,
        };

        if let Some(args) = input.strip_prefix(ADMIN_BYTECODE) {
            contract.kind = MockKind::ProxyAdmin;
            contract.owner = Address::abi_decode(args).map_err(|e| revert(&e.to_string()))?;
        } else if let Some(args) = input.strip_prefix(PROXY_BYTECODE) {
            let (logic, admin, data) = <(Address, Address, Bytes)>::abi_decode_params(args)
                .map_err(|e| revert(&e.to_string()))?;
            contract.kind = MockKind::Proxy;
            contract.admin = admin;
            contract.implementation = logic;
            contract.init_data = data;
            // The initializer runs as the deployer
            contract.owner = from;
        }

        self.contracts.insert(address, contract);
        Ok(address)
    }

    /// Execute a call to an existing contract
    fn execute(
        &mut self,
        from: Address,
        to: Address,
        input: &[u8],
    ) -> Result<&'static str, ScriptError> {
        let contract = self.contracts.get(&to).cloned().ok_or_else(|| revert("no code"))?;

        match selector(input)? {
            ISafeOwnable::transferOwnershipCall::SELECTOR => {
                let call = decode::<ISafeOwnable::transferOwnershipCall>(input)?;
                if from != contract.owner {
                    return Err(revert("caller is not the owner"));
                }
                let target = self.contracts.get_mut(&to).ok_or_else(|| revert("no code"))?;
                match contract.kind {
                    MockKind::ProxyAdmin => target.owner = call.newOwner,
                    MockKind::Proxy => target.pending_owner = call.newOwner,
                    MockKind::Implementation => return Err(revert("not ownable")),
                }
                Ok("transferOwnership")
            }
            ISafeOwnable::acceptOwnershipCall::SELECTOR => {
                if contract.kind != MockKind::Proxy || from != contract.pending_owner {
                    return Err(revert("caller is not the pending owner"));
                }
                let target = self.contracts.get_mut(&to).ok_or_else(|| revert("no code"))?;
                target.owner = from;
                target.pending_owner = Address::ZERO;
                Ok("acceptOwnership")
            }
            IPerpBuybackPool::setPerpBuybackCall::SELECTOR => {
                let call = decode::<IPerpBuybackPool::setPerpBuybackCall>(input)?;
                if contract.kind != MockKind::Proxy || from != contract.owner {
                    return Err(revert("caller is not the owner"));
                }
                let target = self.contracts.get_mut(&to).ok_or_else(|| revert("no code"))?;
                target.perp_buyback = call.perpBuyback;
                Ok("setPerpBuyback")
            }
            IProxyAdmin::upgradeCall::SELECTOR => {
                let call = decode::<IProxyAdmin::upgradeCall>(input)?;
                if contract.kind != MockKind::ProxyAdmin || from != contract.owner {
                    return Err(revert("caller is not the owner"));
                }
                let proxy =
                    self.contracts.get_mut(&call.proxy).ok_or_else(|| revert("no proxy"))?;
                if proxy.admin != to {
                    return Err(revert("not the proxy admin"));
                }
                proxy.implementation = call.implementation;
                Ok("upgrade")
            }
            _ => Err(revert("unknown selector")),
        }
    }

    /// Answer a read-only call
    fn view(&self, to: Address, input: &[u8]) -> Result<Bytes, ScriptError> {
        let contract = self.contracts.get(&to).ok_or_else(|| revert("no code"))?;
        let value = match selector(input)? {
            ISafeOwnable::ownerCall::SELECTOR if contract.kind != MockKind::Implementation => {
                contract.owner
            }
            ISafeOwnable::pendingOwnerCall::SELECTOR if contract.kind == MockKind::Proxy => {
                contract.pending_owner
            }
            IPerpBuybackPool::getPerpBuybackCall::SELECTOR if contract.kind == MockKind::Proxy => {
                contract.perp_buyback
            }
            _ => return Err(revert("unknown selector")),
        };

        Ok(value.abi_encode().into())
    }

    /// A fresh transaction hash
    fn next_tx_hash(&mut self) -> B256 {
        self.nonce += 1;
        B256::left_padding_from(&self.nonce.to_be_bytes())
    }
}

impl Chain for MockChain {
    fn chain_id(&self) -> u64 {
        31337
    }

    fn deployer(&self) -> Address {
        DEPLOYER
    }

    fn can_sign(&self, address: Address) -> bool {
        self.signers.contains(&address)
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ScriptError> {
        self.check_transport(to)?;
        self.state.borrow().view(to, &input)
    }

    async fn send(&self, tx: TxRequest) -> Result<TxOutcome, ScriptError> {
        assert!(self.can_sign(tx.from), "sent from {} without a signer", tx.from);
        if let Some(to) = tx.to {
            self.check_transport(to)?;
        }

        let mut state = self.state.borrow_mut();
        let (contract_address, method) = match tx.to {
            Some(to) => (None, state.execute(tx.from, to, &tx.input)?),
            None => (Some(state.create(tx.from, &tx.input)?), "deploy"),
        };
        state.sent.push(SentTx { from: tx.from, to: tx.to, method });

        Ok(TxOutcome { tx_hash: state.next_tx_hash(), contract_address })
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ScriptError> {
        self.check_transport(address)?;
        let state = self.state.borrow();
        Ok(state.contracts.get(&address).map(|c| c.code.clone()).unwrap_or_default())
    }

    async fn storage_at(&self, address: Address, slot: U256) -> Result<B256, ScriptError> {
        self.check_transport(address)?;
        let state = self.state.borrow();
        let implementation_slot = U256::from_be_bytes(PROXY_IMPLEMENTATION_STORAGE_SLOT.0);
        match state.contracts.get(&address) {
            Some(c) if c.kind == MockKind::Proxy && slot == implementation_slot => {
                Ok(c.implementation.into_word())
            }
            _ => Ok(B256::ZERO),
        }
    }
}

// ------------
// | Fixtures |
// ------------

/// The functions shared by both two-phase ownable contracts
const SAFE_OWNABLE_ABI: [&str; 4] = [
    "function owner() view returns (address)",
    "function pendingOwner() view returns (address)",
    "function transferOwnership(address newOwner)",
    "function acceptOwnership()",
];

/// An artifact with the given creation code and human-readable interface
pub fn artifact<'a>(bytecode: &[u8], abi: impl IntoIterator<Item = &'a str>) -> ContractArtifact {
    ContractArtifact {
        abi: JsonAbi::parse(abi).expect("invalid test abi"),
        bytecode: Bytes::copy_from_slice(bytecode),
    }
}

/// The buyback pool artifact built from `bytecode`
pub fn pool_artifact(bytecode: &[u8]) -> ContractArtifact {
    let abi = SAFE_OWNABLE_ABI.into_iter().chain([
        "function initialize(address usdc, address perp, address perpUsdChainlinkAggregator)",
        "function getPerpBuyback() view returns (address)",
        "function setPerpBuyback(address perpBuyback)",
    ]);
    artifact(bytecode, abi)
}

/// The buyback controller artifact built from `bytecode`
pub fn buyback_artifact(bytecode: &[u8]) -> ContractArtifact {
    let abi = SAFE_OWNABLE_ABI.into_iter().chain([
        "function initialize(address usdc, address perp, address vePerp, address perpBuybackPool)",
    ]);
    artifact(bytecode, abi)
}

/// Artifacts for every contract the steps deploy
pub fn test_artifacts() -> ArtifactStore {
    ArtifactStore::from_artifacts([
        (PERP_BUYBACK_POOL_CONTRACT, pool_artifact(POOL_BYTECODE)),
        (PERP_BUYBACK_CONTRACT, buyback_artifact(BUYBACK_BYTECODE)),
        (
            PROXY_ADMIN_CONTRACT,
            artifact(
                ADMIN_BYTECODE,
                [
                    "function owner() view returns (address)",
                    "function transferOwnership(address newOwner)",
                    "function upgrade(address proxy, address implementation)",
                ],
            ),
        ),
        (TRANSPARENT_PROXY_CONTRACT, artifact(PROXY_BYTECODE, [])),
    ])
}

/// Named addresses pointing the contracts at [SAFE]
pub fn test_addresses() -> NamedAddresses {
    NamedAddresses {
        gnosis_safe: SAFE,
        usdc: Address::repeat_byte(0x01),
        perp: Address::repeat_byte(0x02),
        ve_perp: Address::repeat_byte(0x03),
        perp_usd_chainlink_aggregator: Address::repeat_byte(0x04),
    }
}

/// A runner over `chain` with the test artifacts and no prior deployments
pub fn test_runner(chain: MockChain) -> StepRunner<MockChain> {
    StepRunner::new(chain, test_addresses(), test_artifacts(), DeploymentStore::in_memory())
}
