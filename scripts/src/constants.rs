//! Constants used in the deploy scripts

use alloy::primitives::{b256, B256};

/// The deployment key of the buyback pool contract
pub const PERP_BUYBACK_POOL_KEY: &str = "PerpBuybackPool";

/// The deployment key of the buyback controller contract
pub const PERP_BUYBACK_KEY: &str = "PerpBuyback";

/// The deployment key of the shared proxy admin contract
pub const DEFAULT_PROXY_ADMIN_KEY: &str = "DefaultProxyAdmin";

/// Suffix of the deployment key under which a proxied contract's implementation is recorded
pub const IMPLEMENTATION_KEY_SUFFIX: &str = "_Implementation";

/// Suffix of the deployment key under which a proxied contract's proxy is recorded
pub const PROXY_KEY_SUFFIX: &str = "_Proxy";

/// Fully qualified name of the buyback pool contract
pub const PERP_BUYBACK_POOL_CONTRACT: &str = "src/PerpBuybackPool.sol:PerpBuybackPool";

/// Fully qualified name of the buyback controller contract
pub const PERP_BUYBACK_CONTRACT: &str = "src/PerpBuyback.sol:PerpBuyback";

/// Fully qualified name of the transparent proxy contract
///
/// Constructor: `(address logic, address admin, bytes data)`
pub const TRANSPARENT_PROXY_CONTRACT: &str =
    "@openzeppelin/contracts/proxy/transparent/TransparentUpgradeableProxy.sol:TransparentUpgradeableProxy";

/// Fully qualified name of the proxy admin contract
///
/// Constructor: `(address initialOwner)`
pub const PROXY_ADMIN_CONTRACT: &str =
    "@openzeppelin/contracts/proxy/transparent/ProxyAdmin.sol:ProxyAdmin";

/// The storage slot containing the implementation address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#logic-contract-address
pub const PROXY_IMPLEMENTATION_STORAGE_SLOT: B256 =
    b256!("0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// The name of the file holding the chain ID of a deployments directory
pub const CHAIN_ID_FILE: &str = ".chainId";

/// The deployment keys of the contracts whose ownership is handed to the multisig, in order
pub const OWNABLE_CONTRACT_KEYS: [&str; 2] = [PERP_BUYBACK_POOL_KEY, PERP_BUYBACK_KEY];

/// The extension of deployment record and artifact files
pub const JSON_EXTENSION: &str = "json";

/// The default directory holding deployment records
pub const DEFAULT_DEPLOYMENTS_DIR: &str = "deployments";

/// The extension of the pending actions file written next to a network's deployments
pub const PENDING_ACTIONS_EXTENSION: &str = "pending.json";

/// The default directory holding compiled contract artifacts
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// The RPC URL used for the localhost network when none is given
pub const LOCALHOST_RPC_URL: &str = "http://127.0.0.1:8545";

/// The development mnemonic shared by Hardhat and Anvil devnets
pub const DEVNET_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// Index of the deployer account in the deployer mnemonic
pub const DEPLOYER_ACCOUNT_INDEX: u32 = 0;

/// Version string written into Safe transaction batches
pub const SAFE_BATCH_VERSION: &str = "1.0";

/// Name given to Safe transaction batches
pub const SAFE_BATCH_NAME: &str = "Buyback deployment";
