//! Utilities for the deploy scripts.

use std::{
    env,
    path::{Path, PathBuf},
};

use crate::{
    chain::RpcChain,
    config::{EndpointArgs, Network, NetworkSettings},
    constants::PENDING_ACTIONS_EXTENSION,
    errors::ScriptError,
};

/// Sets up the client for `network`, taking the RPC URL and keys from the
/// command line and falling back to the environment.
pub async fn setup_client(
    network: Network,
    endpoint: &EndpointArgs,
) -> Result<RpcChain, ScriptError> {
    let settings = NetworkSettings::resolve(network, endpoint, |var| env::var(var).ok())?;
    RpcChain::connect(&settings).await
}

/// The directory holding the deployment records of `network`
pub fn network_deployments_dir(root: &Path, network: Network) -> PathBuf {
    root.join(network.to_string())
}

/// The default pending actions file of `network`, a sibling of its records directory
pub fn default_pending_actions_path(root: &Path, network: Network) -> PathBuf {
    root.join(format!("{network}.{PENDING_ACTIONS_EXTENSION}"))
}
