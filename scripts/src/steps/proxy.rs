//! Deployment of contracts behind transparent upgradeable proxies.
//!
//! A proxied contract `Key` is stored under three records: `Key_Implementation`
//! for the logic contract, `Key_Proxy` for the proxy itself, and `Key`, which
//! holds the proxy address with the implementation's interface. All proxies
//! share a single `DefaultProxyAdmin`.

use alloy::{
    primitives::{Address, Bytes, U256},
    sol_types::{SolCall, SolValue},
};
use tracing::{info, warn};

use super::StepRunner;
use crate::{
    artifacts::ContractArtifact,
    chain::{Chain, TxRequest},
    constants::{
        DEFAULT_PROXY_ADMIN_KEY, IMPLEMENTATION_KEY_SUFFIX, PERP_BUYBACK_CONTRACT,
        PERP_BUYBACK_KEY, PERP_BUYBACK_POOL_CONTRACT, PERP_BUYBACK_POOL_KEY, PROXY_ADMIN_CONTRACT,
        PROXY_IMPLEMENTATION_STORAGE_SLOT, PROXY_KEY_SUFFIX, TRANSPARENT_PROXY_CONTRACT,
    },
    deployments::DeploymentRecord,
    errors::ScriptError,
    executor::Execution,
    solidity::{IPerpBuyback, IPerpBuybackPool, IProxyAdmin},
};

impl<C: Chain> StepRunner<C> {
    /// Deploy the buyback pool, initialized with the token and oracle addresses
    pub(super) async fn deploy_perp_buyback_pool(&mut self) -> Result<(), ScriptError> {
        let init = IPerpBuybackPool::initializeCall {
            usdc: self.addresses.usdc,
            perp: self.addresses.perp,
            perpUsdChainlinkAggregator: self.addresses.perp_usd_chainlink_aggregator,
        };

        self.deploy_proxied(PERP_BUYBACK_POOL_KEY, PERP_BUYBACK_POOL_CONTRACT, init.abi_encode())
            .await
    }

    /// Deploy the buyback controller, initialized with the token addresses and the pool
    pub(super) async fn deploy_perp_buyback(&mut self) -> Result<(), ScriptError> {
        let init = IPerpBuyback::initializeCall {
            usdc: self.addresses.usdc,
            perp: self.addresses.perp,
            vePerp: self.addresses.ve_perp,
            perpBuybackPool: self.deployments.require(PERP_BUYBACK_POOL_KEY)?.address,
        };

        self.deploy_proxied(PERP_BUYBACK_KEY, PERP_BUYBACK_CONTRACT, init.abi_encode()).await
    }

    /// Deploy `contract` behind a proxy recorded under `key`, or bring an
    /// existing proxy up to date with the current artifact.
    ///
    /// `init` is the initializer calldata the proxy delegates on construction.
    async fn deploy_proxied(
        &mut self,
        key: &str,
        contract: &str,
        init: Vec<u8>,
    ) -> Result<(), ScriptError> {
        let artifact = self.artifacts.get(contract)?.clone();
        let admin = self.ensure_proxy_admin().await?;
        let implementation = self.ensure_implementation(key, &artifact).await?;

        let Some(proxy) = self.live_record(key).await? else {
            let proxy_artifact = self.artifacts.get(TRANSPARENT_PROXY_CONTRACT)?.clone();
            let args = (implementation, admin, Bytes::from(init)).abi_encode_params();
            let proxy_key = format!("{key}{PROXY_KEY_SUFFIX}");
            let proxy = self.deploy_contract(&proxy_key, &proxy_artifact, &args).await?;

            let record = DeploymentRecord {
                abi: artifact.abi.clone(),
                implementation: Some(implementation),
                bytecode_hash: Some(artifact.bytecode_hash()),
                ..proxy
            };
            info!("{key} deployed at {:#x}", record.address);
            return self.deployments.save(key, record);
        };

        let current = self.proxy_implementation(proxy.address).await?;
        if current != implementation {
            info!(
                "Upgrading {key} at {:#x} from {current:#x} to {implementation:#x}",
                proxy.address
            );
            let admin_owner = self.read(DEFAULT_PROXY_ADMIN_KEY, IProxyAdmin::ownerCall {}).await?;
            let upgrade = IProxyAdmin::upgradeCall { proxy: proxy.address, implementation };
            let execution = self.execute(DEFAULT_PROXY_ADMIN_KEY, admin_owner, upgrade).await?;
            if execution == Execution::Deferred {
                // The record keeps describing the live implementation until the upgrade lands
                return Ok(());
            }
        } else if proxy.implementation == Some(implementation) {
            info!("Reusing {key} at {:#x}", proxy.address);
            return Ok(());
        }

        let record = DeploymentRecord {
            abi: artifact.abi.clone(),
            implementation: Some(implementation),
            bytecode_hash: Some(artifact.bytecode_hash()),
            ..proxy
        };
        self.deployments.save(key, record)
    }

    /// The address of the shared proxy admin, deploying it owned by the safe if needed
    async fn ensure_proxy_admin(&mut self) -> Result<Address, ScriptError> {
        if let Some(admin) = self.live_record(DEFAULT_PROXY_ADMIN_KEY).await? {
            return Ok(admin.address);
        }

        let artifact = self.artifacts.get(PROXY_ADMIN_CONTRACT)?.clone();
        let args = (self.addresses.gnosis_safe,).abi_encode_params();
        let admin = self.deploy_contract(DEFAULT_PROXY_ADMIN_KEY, &artifact, &args).await?;
        Ok(admin.address)
    }

    /// The address of `key`'s implementation, deploying it if the recorded
    /// one was built from different bytecode
    async fn ensure_implementation(
        &mut self,
        key: &str,
        artifact: &ContractArtifact,
    ) -> Result<Address, ScriptError> {
        let implementation_key = format!("{key}{IMPLEMENTATION_KEY_SUFFIX}");
        if let Some(record) = self.live_record(&implementation_key).await? {
            let hash = artifact.bytecode_hash();
            if record.creation_code_hash() == Some(hash) {
                let address = record.address;
                if record.bytecode_hash.is_none() {
                    let record = DeploymentRecord { bytecode_hash: Some(hash), ..record };
                    self.deployments.save(&implementation_key, record)?;
                }
                return Ok(address);
            }
            info!("{implementation_key} bytecode changed, deploying a new implementation");
        }

        let record = self.deploy_contract(&implementation_key, artifact, &[]).await?;
        Ok(record.address)
    }

    /// Deploy `artifact` with ABI-encoded constructor arguments from the
    /// deployer, recording it under `key`
    async fn deploy_contract(
        &mut self,
        key: &str,
        artifact: &ContractArtifact,
        constructor_args: &[u8],
    ) -> Result<DeploymentRecord, ScriptError> {
        let tx = TxRequest {
            from: self.chain.deployer(),
            to: None,
            input: artifact.deploy_code(constructor_args),
        };
        let outcome = self.chain.send(tx).await?;
        let address = outcome.contract_address.ok_or_else(|| {
            ScriptError::ContractDeployment(format!("no contract address in receipt for {key}"))
        })?;
        info!("Deployed {key} at {address:#x} (tx: {:#x})", outcome.tx_hash);

        let record = DeploymentRecord {
            address,
            abi: artifact.abi.clone(),
            transaction_hash: Some(outcome.tx_hash),
            implementation: None,
            bytecode_hash: Some(artifact.bytecode_hash()),
            bytecode: Some(artifact.bytecode.clone()),
        };
        self.deployments.save(key, record.clone())?;
        Ok(record)
    }

    /// The record under `key`, unless it is missing or its address has no code
    async fn live_record(&self, key: &str) -> Result<Option<DeploymentRecord>, ScriptError> {
        let Some(record) = self.deployments.get(key) else {
            return Ok(None);
        };

        if self.chain.code_at(record.address).await?.is_empty() {
            warn!("{key} recorded at {:#x} has no code, redeploying", record.address);
            return Ok(None);
        }
        Ok(Some(record.clone()))
    }

    /// The implementation a proxy currently delegates to
    pub(super) async fn proxy_implementation(
        &self,
        proxy: Address,
    ) -> Result<Address, ScriptError> {
        let slot = U256::from_be_bytes(PROXY_IMPLEMENTATION_STORAGE_SLOT.0);
        let word = self.chain.storage_at(proxy, slot).await?;
        Ok(Address::from_word(word))
    }
}
