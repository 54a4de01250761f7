//! Per-network configuration: named addresses and RPC/signer settings.
//!
//! Everything in here is resolved once at startup into immutable values which
//! are then handed to the step runner.

use std::fmt::{self, Display};

use alloy::primitives::{address, Address};
use clap::{Args, ValueEnum};

use crate::{
    constants::{DEPLOYER_ACCOUNT_INDEX, DEVNET_MNEMONIC, LOCALHOST_RPC_URL},
    errors::ScriptError,
};

/// The networks the contracts can be deployed to
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Network {
    /// Optimism mainnet
    Optimism,
    /// Optimism Goerli testnet
    OptimismGoerli,
    /// A local Hardhat or Anvil devnet
    Localhost,
}

impl Network {
    /// The chain ID the network's RPC endpoint must report
    pub fn chain_id(self) -> u64 {
        match self {
            Network::Optimism => 10,
            Network::OptimismGoerli => 420,
            Network::Localhost => 31337,
        }
    }

    /// The environment variable holding the RPC URL
    pub fn rpc_url_env_var(self) -> Option<&'static str> {
        match self {
            Network::Optimism => Some("OPTIMISM_WEB3_ENDPOINT"),
            Network::OptimismGoerli => Some("OPTIMISM_GOERLI_WEB3_ENDPOINT"),
            Network::Localhost => None,
        }
    }

    /// The environment variable holding the deployer mnemonic
    pub fn mnemonic_env_var(self) -> Option<&'static str> {
        match self {
            Network::Optimism => Some("OPTIMISM_DEPLOYER_MNEMONIC"),
            Network::OptimismGoerli => Some("OPTIMISM_GOERLI_DEPLOYER_MNEMONIC"),
            Network::Localhost => None,
        }
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Optimism => write!(f, "optimism"),
            Network::OptimismGoerli => write!(f, "optimism-goerli"),
            Network::Localhost => write!(f, "localhost"),
        }
    }
}

// -------------------
// | Named addresses |
// -------------------

/// The well-known external addresses the deployment depends on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NamedAddresses {
    /// The multisig that ends up owning every contract
    pub gnosis_safe: Address,
    /// The USDC token
    pub usdc: Address,
    /// The PERP token
    pub perp: Address,
    /// The vote-escrowed PERP token
    pub ve_perp: Address,
    /// The Chainlink PERP/USD price aggregator
    pub perp_usd_chainlink_aggregator: Address,
}

/// [NamedAddresses] on Optimism mainnet
pub const OPTIMISM: NamedAddresses = NamedAddresses {
    gnosis_safe: address!("0x5E5c7dE5E4C223B7fA506E2C2b7328fA8388d502"),
    usdc: address!("0x7f5c764cbc14f9669b88837ca1490cca17c31607"),
    perp: address!("0x9e1028f5f1d5ede59748ffcee5532509976840e0"),
    ve_perp: address!("0xD360B73b19Fb20aC874633553Fb1007e9FcB2b78"),
    // https://docs.chain.link/data-feeds/price-feeds/addresses?network=optimism
    perp_usd_chainlink_aggregator: address!("0xA12CDDd8e986AF9288ab31E58C60e65F2987fB13"),
};

/// [NamedAddresses] on Optimism Goerli
pub const OPTIMISM_GOERLI: NamedAddresses = NamedAddresses {
    gnosis_safe: address!("0x9E9DFaCCABeEcDA6dD913b3685c9fe908F28F58c"),
    usdc: address!("0xe5e0DE0ABfEc2FFFaC167121E51d7D8f57C8D9bC"),
    perp: address!("0x0994206dfE8De6Ec6920FF4D779B0d950605Fb53"),
    ve_perp: address!("0xcD1d0954D5D00f357A0B2aB7D0625ED7c41C9245"),
    // Mock aggregator, always returns 1 PERP = 10 USD
    perp_usd_chainlink_aggregator: address!("0xFd79003451Ec6E8D595Cb0408caA29BbF5BE939A"),
};

impl NamedAddresses {
    /// Lookup the built-in [NamedAddresses] by chain ID
    pub const fn from_chain_id(chain_id: u64) -> Option<NamedAddresses> {
        match chain_id {
            10 => Some(OPTIMISM),
            420 => Some(OPTIMISM_GOERLI),
            _ => None,
        }
    }

    /// Resolve the named addresses for a chain, letting `overrides` take
    /// precedence over the built-in table
    pub fn resolve(chain_id: u64, overrides: &AddressOverrides) -> Result<Self, ScriptError> {
        let table = Self::from_chain_id(chain_id);
        let pick = |name: &str, over: Option<Address>, builtin: fn(&Self) -> Address| {
            over.or_else(|| table.as_ref().map(builtin)).ok_or_else(|| {
                ScriptError::Configuration(format!(
                    "no `{name}` address configured for chain {chain_id}"
                ))
            })
        };

        Ok(NamedAddresses {
            gnosis_safe: pick("gnosisSafeAddress", overrides.gnosis_safe, |a| a.gnosis_safe)?,
            usdc: pick("usdc", overrides.usdc, |a| a.usdc)?,
            perp: pick("perp", overrides.perp, |a| a.perp)?,
            ve_perp: pick("vePerp", overrides.ve_perp, |a| a.ve_perp)?,
            perp_usd_chainlink_aggregator: pick(
                "perpUsdChainlinkAggregator",
                overrides.perp_usd_chainlink_aggregator,
                |a| a.perp_usd_chainlink_aggregator,
            )?,
        })
    }
}

/// Overrides for the named addresses, required on networks without a built-in table
#[derive(Args, Clone, Debug, Default)]
pub struct AddressOverrides {
    /// Address of the multisig that will own the contracts
    #[arg(long, env = "GNOSIS_SAFE_ADDRESS")]
    pub gnosis_safe: Option<Address>,

    /// Address of the USDC token
    #[arg(long, env = "USDC_ADDRESS")]
    pub usdc: Option<Address>,

    /// Address of the PERP token
    #[arg(long, env = "PERP_ADDRESS")]
    pub perp: Option<Address>,

    /// Address of the vePERP token
    #[arg(long, env = "VE_PERP_ADDRESS")]
    pub ve_perp: Option<Address>,

    /// Address of the PERP/USD Chainlink aggregator
    #[arg(long, env = "PERP_USD_AGGREGATOR_ADDRESS")]
    pub perp_usd_chainlink_aggregator: Option<Address>,
}

// --------------------
// | Network settings |
// --------------------

/// Where the deployer's key comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeySource {
    /// A raw hex private key
    PrivateKey(String),
    /// A BIP-39 mnemonic, using the account at the given index
    Mnemonic {
        /// The mnemonic phrase
        phrase: String,
        /// The derivation index of the account
        index: u32,
    },
}

/// The RPC endpoint and signer settings for a network
#[derive(Clone, Debug)]
pub struct NetworkSettings {
    /// The selected network
    pub network: Network,
    /// The RPC URL to connect to
    pub rpc_url: String,
    /// The deployer's key
    pub deployer_key: KeySource,
    /// An optional key for the target owner, letting the second phase of
    /// ownership transfers be executed directly instead of deferred
    pub owner_key: Option<String>,
}

/// Endpoint values given explicitly on the command line, which win over the environment
#[derive(Args, Clone, Debug, Default)]
pub struct EndpointArgs {
    /// Network RPC URL, defaults to the network's `*_WEB3_ENDPOINT` variable
    #[arg(short, long)]
    pub rpc_url: Option<String>,

    /// Private key of the deployer
    #[arg(short, long, env = "PKEY")]
    pub priv_key: Option<String>,

    /// Mnemonic of the deployer, defaults to the network's `*_DEPLOYER_MNEMONIC` variable
    #[arg(long)]
    pub mnemonic: Option<String>,

    /// Private key of the target owner, if it is held locally
    #[arg(long, env = "OWNER_PKEY")]
    pub owner_priv_key: Option<String>,
}

impl NetworkSettings {
    /// Resolve the settings for `network`, looking up unset values with `env`
    pub fn resolve(
        network: Network,
        args: &EndpointArgs,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ScriptError> {
        let lookup = |var: Option<&str>| var.and_then(|v| env(v)).filter(|v| !v.is_empty());

        let rpc_url = args
            .rpc_url
            .clone()
            .or_else(|| lookup(network.rpc_url_env_var()))
            .or_else(|| (network == Network::Localhost).then(|| LOCALHOST_RPC_URL.to_string()))
            .ok_or_else(|| {
                ScriptError::Configuration(format!(
                    "no RPC URL for {network}, set {} or pass --rpc-url",
                    network.rpc_url_env_var().unwrap_or("--rpc-url")
                ))
            })?;

        let deployer_key = if let Some(key) = args.priv_key.clone() {
            KeySource::PrivateKey(key)
        } else {
            let phrase = args
                .mnemonic
                .clone()
                .or_else(|| lookup(network.mnemonic_env_var()))
                .or_else(|| (network == Network::Localhost).then(|| DEVNET_MNEMONIC.to_string()))
                .ok_or_else(|| {
                    ScriptError::Configuration(format!(
                        "no deployer key for {network}, set {} or pass --priv-key",
                        network.mnemonic_env_var().unwrap_or("--mnemonic")
                    ))
                })?;
            KeySource::Mnemonic {
                phrase,
                index: DEPLOYER_ACCOUNT_INDEX,
            }
        };

        Ok(NetworkSettings {
            network,
            rpc_url,
            deployer_key,
            owner_key: args.owner_priv_key.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use alloy::primitives::Address;

    use super::*;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| vars.get(k).cloned()
    }

    #[test]
    fn test_builtin_table_resolves() {
        let addrs = NamedAddresses::resolve(10, &AddressOverrides::default()).unwrap();
        assert_eq!(addrs, OPTIMISM);

        let addrs = NamedAddresses::resolve(420, &AddressOverrides::default()).unwrap();
        assert_eq!(addrs.gnosis_safe, OPTIMISM_GOERLI.gnosis_safe);
    }

    #[test]
    fn test_override_wins_over_table() {
        let safe = Address::repeat_byte(0x11);
        let overrides = AddressOverrides { gnosis_safe: Some(safe), ..Default::default() };
        let addrs = NamedAddresses::resolve(10, &overrides).unwrap();

        assert_eq!(addrs.gnosis_safe, safe);
        assert_eq!(addrs.usdc, OPTIMISM.usdc);
    }

    #[test]
    fn test_missing_address_is_configuration_error() {
        let overrides = AddressOverrides {
            gnosis_safe: Some(Address::repeat_byte(1)),
            usdc: Some(Address::repeat_byte(2)),
            perp: Some(Address::repeat_byte(3)),
            ve_perp: Some(Address::repeat_byte(4)),
            perp_usd_chainlink_aggregator: None,
        };
        let err = NamedAddresses::resolve(31337, &overrides).unwrap_err();

        assert!(matches!(
            err,
            ScriptError::Configuration(msg) if msg.contains("perpUsdChainlinkAggregator")
        ));
    }

    #[test]
    fn test_settings_from_env() {
        let env = env_of(&[
            ("OPTIMISM_WEB3_ENDPOINT", "https://op.example"),
            ("OPTIMISM_DEPLOYER_MNEMONIC", "some words"),
        ]);
        let settings =
            NetworkSettings::resolve(Network::Optimism, &EndpointArgs::default(), env).unwrap();

        assert_eq!(settings.rpc_url, "https://op.example");
        assert_eq!(
            settings.deployer_key,
            KeySource::Mnemonic { phrase: "some words".to_string(), index: 0 }
        );
    }

    #[test]
    fn test_settings_args_win_over_env() {
        let env = env_of(&[("OPTIMISM_WEB3_ENDPOINT", "https://op.example")]);
        let args = EndpointArgs {
            rpc_url: Some("http://other".to_string()),
            priv_key: Some("0xabc".to_string()),
            ..Default::default()
        };
        let settings = NetworkSettings::resolve(Network::Optimism, &args, env).unwrap();

        assert_eq!(settings.rpc_url, "http://other");
        assert_eq!(settings.deployer_key, KeySource::PrivateKey("0xabc".to_string()));
    }

    #[test]
    fn test_settings_missing_env_is_configuration_error() {
        let err =
            NetworkSettings::resolve(Network::OptimismGoerli, &EndpointArgs::default(), env_of(&[]))
                .unwrap_err();
        assert!(matches!(err, ScriptError::Configuration(_)));
    }

    #[test]
    fn test_localhost_defaults() {
        let settings =
            NetworkSettings::resolve(Network::Localhost, &EndpointArgs::default(), env_of(&[]))
                .unwrap();

        assert_eq!(settings.rpc_url, LOCALHOST_RPC_URL);
        assert!(matches!(
            settings.deployer_key,
            KeySource::Mnemonic { ref phrase, .. } if phrase == DEVNET_MNEMONIC
        ));
    }
}
